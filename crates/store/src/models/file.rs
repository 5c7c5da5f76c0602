use super::timestamp;
use crate::error::{Error, ErrorKind};
use crate::records::MediaFile;
use exn::ResultExt;

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    id: i64,
    file_key: String,
    format: String,
    user_id: String,
    size: i64,
    create_at: i64,
    update_at: i64,
}
impl TryFrom<FileRow> for MediaFile {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            key: row.file_key,
            format: row.format,
            user_id: row.user_id,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            created: timestamp(row.create_at, "file create_at")?,
            modified: timestamp(row.update_at, "file update_at")?,
        })
    }
}

/// Just enough of a file row to delete its blob.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub(crate) struct MediaRefRow {
    pub(crate) id: i64,
    pub(crate) file_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_media_file() {
        let row = FileRow {
            id: 1,
            file_key: "0f8fad5b-d9cb-469f-a165-70867728950e".to_string(),
            format: "video/mp4".to_string(),
            user_id: "u1".to_string(),
            size: 2048,
            create_at: 1_700_000_000,
            update_at: 1_700_000_100,
        };
        let file = MediaFile::try_from(row).unwrap();
        assert_eq!(file.size, 2048);
        assert_eq!(file.modified.unix_timestamp(), 1_700_000_100);
    }

    #[test]
    fn test_negative_size_is_invalid() {
        let row = FileRow {
            id: 1,
            file_key: "k".to_string(),
            format: "image/png".to_string(),
            user_id: "u1".to_string(),
            size: -1,
            create_at: 0,
            update_at: 0,
        };
        let err = MediaFile::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("file size")));
    }
}
