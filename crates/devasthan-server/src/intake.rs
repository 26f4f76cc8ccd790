//! SOS alert intake: the registry plus live notification of changes.

use chrono::Utc;
use devasthan_alerts::{
    acknowledge_alert, active_alerts, create_alert, resolve_alert, NewAlert, SosAlert, StatusChange,
};
use devasthan_db::DbPool;
use devasthan_types::{GeoPoint, LiveEvent};

use crate::error::{with_conn, CoreError};
use crate::hub::BroadcastHub;

/// Creates and advances SOS alerts, publishing each change to the hub.
#[derive(Clone)]
pub struct AlertIntake {
    pool: DbPool,
    hub: BroadcastHub,
}

impl AlertIntake {
    pub fn new(pool: DbPool, hub: BroadcastHub) -> Self {
        Self { pool, hub }
    }

    /// Records a new alert and broadcasts it as an `sos_alert` event.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for out-of-range coordinates or an oversized
    /// description, `StorageUnavailable` if the write fails.
    pub async fn submit_alert(
        &self,
        latitude: f64,
        longitude: f64,
        description: Option<String>,
        reporter_id: Option<i64>,
    ) -> Result<SosAlert, CoreError> {
        let location =
            GeoPoint::new(latitude, longitude).map_err(|e| CoreError::InvalidInput(e.to_string()))?;
        let params = NewAlert {
            location,
            description,
            reporter_id,
        };

        let alert = with_conn(&self.pool, move |conn| {
            Ok(create_alert(conn, &params, Utc::now())?)
        })
        .await?;

        self.publish(&alert).await;
        Ok(alert)
    }

    /// Acknowledges an alert. Re-acknowledging, or acknowledging a
    /// resolved alert, succeeds without change or broadcast.
    pub async fn acknowledge_alert(&self, id: i64) -> Result<SosAlert, CoreError> {
        let change = with_conn(&self.pool, move |conn| Ok(acknowledge_alert(conn, id)?)).await?;
        self.settle(change).await
    }

    /// Resolves an alert. Terminal; repeated calls are no-ops.
    pub async fn resolve_alert(&self, id: i64) -> Result<SosAlert, CoreError> {
        let change = with_conn(&self.pool, move |conn| Ok(resolve_alert(conn, id)?)).await?;
        self.settle(change).await
    }

    /// Alerts still `new` or `acknowledged`, newest first.
    pub async fn active_alerts(&self) -> Result<Vec<SosAlert>, CoreError> {
        with_conn(&self.pool, |conn| Ok(active_alerts(conn)?)).await
    }

    async fn settle(&self, change: StatusChange) -> Result<SosAlert, CoreError> {
        if change.changed {
            self.publish(&change.alert).await;
        }
        Ok(change.alert)
    }

    async fn publish(&self, alert: &SosAlert) {
        let report = self.hub.broadcast(&LiveEvent::SosAlert(alert.to_event())).await;
        tracing::debug!(
            alert_id = alert.id,
            status = %alert.status,
            attempted = report.attempted,
            dropped = report.dropped,
            "sos alert fanned out"
        );
    }
}
