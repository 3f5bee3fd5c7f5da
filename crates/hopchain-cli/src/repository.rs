// crates/hopchain-cli/src/repository.rs
//
// The CLI's local repository: a MemoryRepository loaded from and saved to
// the JSON snapshot named by `data_file`.

use std::path::Path;
use std::sync::Arc;

use hopchain_store::{MemoryRepository, RepositorySnapshot};

use crate::config::HopchainConfig;

pub fn open(config: &HopchainConfig) -> Result<Arc<MemoryRepository>, Box<dyn std::error::Error>> {
    let path = config.data_path();
    let snapshot = RepositorySnapshot::load(Path::new(&path))?;
    Ok(Arc::new(MemoryRepository::from_snapshot(snapshot)?))
}

pub fn save(
    config: &HopchainConfig,
    repo: &MemoryRepository,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.data_path();
    repo.snapshot()?.save(Path::new(&path))?;
    tracing::debug!("Saved repository to {}", path);
    Ok(())
}
