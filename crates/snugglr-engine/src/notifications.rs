use uuid::Uuid;

use snugglr_types::api::{NotificationPage, NotificationQuery};
use snugglr_types::models::Notification;

use crate::convert::notification;
use crate::error::{EngineError, EngineResult};
use crate::Engine;

const MAX_PAGE_SIZE: u32 = 100;

impl Engine {
    pub fn notifications(&self, user_id: Uuid, query: &NotificationQuery) -> EngineResult<NotificationPage> {
        let me = user_id.to_string();
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = u64::from(page - 1) * u64::from(limit);

        let notifications = self
            .db
            .list_notifications(&me, query.unread_only, limit, offset)?
            .iter()
            .map(notification)
            .collect::<EngineResult<Vec<_>>>()?;
        let total = self.db.count_notifications(&me, query.unread_only)?;
        let unread_count = self.db.count_notifications(&me, true)?;

        Ok(NotificationPage {
            notifications,
            current_page: page,
            total_pages: total.div_ceil(u64::from(limit)),
            total,
            unread_count,
        })
    }

    pub fn unread_count(&self, user_id: Uuid) -> EngineResult<u64> {
        Ok(self.db.count_notifications(&user_id.to_string(), true)?)
    }

    pub fn mark_notification_read(&self, notification_id: Uuid, user_id: Uuid) -> EngineResult<Notification> {
        let row = self
            .db
            .mark_notification_read(&notification_id.to_string(), &user_id.to_string())?
            .ok_or_else(|| EngineError::not_found("Notification not found"))?;
        notification(&row)
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> EngineResult<usize> {
        Ok(self.db.mark_all_notifications_read(&user_id.to_string())?)
    }

    pub fn delete_notification(&self, notification_id: Uuid, user_id: Uuid) -> EngineResult<()> {
        if self.db.delete_notification(&notification_id.to_string(), &user_id.to_string())? {
            Ok(())
        } else {
            Err(EngineError::not_found("Notification not found"))
        }
    }

    pub fn clear_read_notifications(&self, user_id: Uuid) -> EngineResult<usize> {
        Ok(self.db.clear_read_notifications(&user_id.to_string())?)
    }
}
