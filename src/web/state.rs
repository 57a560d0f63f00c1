use crate::{h5p::H5pStorage, model::ModelManager};

#[derive(Debug, Clone)]
pub struct AppState {
    mm: ModelManager,
    storage: H5pStorage,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(mm: ModelManager, storage: H5pStorage) -> Self {
        Self {
            mm,
            storage,
            http: reqwest::Client::new(),
        }
    }

    pub fn pool(&self) -> &ModelManager {
        &self.mm
    }

    pub fn storage(&self) -> &H5pStorage {
        &self.storage
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
