use super::timestamp;
use crate::error::Error;
use crate::records::VideoTask;

#[derive(sqlx::FromRow)]
pub(crate) struct VideoTaskRow {
    resource_id: i64,
    task_id: String,
    output: Option<String>,
    create_at: i64,
    update_at: i64,
}
impl TryFrom<VideoTaskRow> for VideoTask {
    type Error = Error;
    fn try_from(row: VideoTaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            resource_id: row.resource_id,
            task_id: row.task_id,
            output: row.output.filter(|o| !o.is_empty()),
            created: timestamp(row.create_at, "video_task create_at")?,
            updated: timestamp(row.update_at, "video_task update_at")?,
        })
    }
}
