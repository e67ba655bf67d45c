use std::path::PathBuf;

use cli_table::{print_stdout, Cell, Style, Table};
use folio_chat::FileStorage;

use crate::prelude::*;

/// Session directories under `<config_dir>/sessions`.
#[derive(Debug, Clone)]
pub struct Sessions {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub keys: usize,
    pub bytes: u64,
}

impl Sessions {
    pub fn new(config_dir: &str) -> Self {
        Self {
            root: PathBuf::from(config_dir).join("sessions"),
        }
    }

    pub fn storage(&self, id: &str, quota: Option<usize>) -> Result<FileStorage> {
        let storage = FileStorage::new(self.dir(id)?);

        Ok(match quota {
            Some(quota) => storage.with_quota(quota),
            None => storage,
        })
    }

    /// Deletes everything stored for the session.
    pub fn end(&self, id: &str) -> Result<()> {
        let dir = self.dir(id)?;
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            log::info!("removed session dir {}", dir.display());
        }

        Ok(())
    }

    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let mut keys = 0;
            let mut bytes = 0;
            for file in std::fs::read_dir(entry.path())? {
                let metadata = file?.metadata()?;
                if metadata.is_file() {
                    keys += 1;
                    bytes += metadata.len();
                }
            }

            sessions.push(SessionSummary {
                id: entry.file_name().to_string_lossy().into_owned(),
                keys,
                bytes,
            });
        }
        sessions.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(sessions)
    }

    pub fn print_list(&self) -> Result<()> {
        let rows = self
            .list()?
            .into_iter()
            .map(|session| vec![session.id.cell(), session.keys.cell(), session.bytes.cell()])
            .collect::<Vec<_>>();

        let table = rows.table().title(vec![
            "Session".cell().bold(true),
            "Keys".cell().bold(true),
            "Bytes".cell().bold(true),
        ]);

        print_stdout(table)?;

        Ok(())
    }

    fn dir(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(self.root.join(id))
        } else {
            Err(Error::InvalidSession(id.to_string()))
        }
    }
}

/// A fresh session id.
pub fn new_session_id() -> String {
    xid::new().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_chat::SessionStorage;

    #[test]
    fn sessions_are_listed_and_ended() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let sessions = Sessions::new(&dir.path().to_string_lossy());

        sessions.storage("b-session", None)?.set_item("history", "[1]")?;
        sessions.storage("a-session", None)?.set_item("history", "[]")?;

        let listed = sessions.list()?;
        assert_eq!(
            listed,
            vec![
                SessionSummary {
                    id: "a-session".to_string(),
                    keys: 1,
                    bytes: 2,
                },
                SessionSummary {
                    id: "b-session".to_string(),
                    keys: 1,
                    bytes: 3,
                },
            ]
        );

        sessions.end("a-session")?;
        assert_eq!(sessions.list()?.len(), 1);

        Ok(())
    }

    #[test]
    fn session_ids_cannot_escape_the_root() {
        let sessions = Sessions::new("/tmp/folio-chat");

        assert!(matches!(
            sessions.storage("../etc", None),
            Err(Error::InvalidSession(_))
        ));
        assert!(matches!(sessions.end(""), Err(Error::InvalidSession(_))));
    }

    #[test]
    fn generated_ids_are_valid() {
        let sessions = Sessions::new("/tmp/folio-chat");

        assert!(sessions.storage(&new_session_id(), None).is_ok());
    }
}
