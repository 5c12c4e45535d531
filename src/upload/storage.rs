// src/upload/storage.rs

//! Ciphertext transfer to object storage
//!
//! One blocking call with one outcome. A failed transfer is fatal to the
//! whole publish: uploads are not resumable, the caller restarts from
//! encryption.

use crate::deadline::Deadline;
use crate::error::Result;
use crate::remote::ObjectStore;
use std::path::Path;
use tracing::info;

/// Upload the encrypted package to the allocated storage URI.
pub fn upload_ciphertext<S: ObjectStore>(
    store: &S,
    uri: &str,
    ciphertext: &Path,
    deadline: &Deadline,
) -> Result<()> {
    deadline.check()?;
    info!("Transferring {} to object storage", ciphertext.display());
    store.put_object(uri, ciphertext, deadline)?;
    Ok(())
}
