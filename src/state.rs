use crate::storage::Store;
use crate::week::{WeekCollection, WeekLifecycle};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerData {
    pub weeks: BTreeMap<i64, WeekCollection>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub lifecycle: WeekLifecycle,
    pub data: Arc<Mutex<TrackerData>>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            lifecycle: WeekLifecycle::new(Arc::clone(&store)),
            store,
            data: Arc::new(Mutex::new(TrackerData::default())),
        }
    }
}
