//! Shared application state for all routes.

use crate::attachments::AttachmentStore;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub attachments: Arc<AttachmentStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, attachments: AttachmentStore) -> Self {
        AppState {
            store,
            attachments: Arc::new(attachments),
        }
    }
}
