use std::sync::Arc;

use crate::applications::ApplicationManager;
use crate::config::Config;
use crate::cv::CvManager;
use crate::listings::ListingManager;
use crate::store::EntityStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub cvs: CvManager,
    pub listings: ListingManager,
    pub applications: ApplicationManager,
    pub config: Config,
}

impl AppState {
    /// Wires the three lifecycle managers over one store backend.
    pub fn new<S>(store: Arc<S>, config: Config) -> Self
    where
        S: EntityStore + 'static,
    {
        let listings = ListingManager::new(store.clone(), store.clone());
        let cvs = CvManager::new(store.clone(), store.clone());
        let applications = ApplicationManager::new(store.clone(), store, listings.clone());
        AppState {
            cvs,
            listings,
            applications,
            config,
        }
    }
}
