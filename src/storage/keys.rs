//! Namespaced document key builders.
//! Keep this module focused and small; complex logic belongs in higher layers.

use uuid::Uuid;

/// Build keys for store-scoped namespaces.
pub struct Keys;

impl Keys {
    pub fn folder(ns: &str, id: &Uuid) -> String {
        format!("{}{}", Self::folder_prefix(ns), id)
    }
    #[inline]
    pub fn folder_prefix(ns: &str) -> String { format!("{}.docfs.folder::", ns) }
    pub fn file(ns: &str, id: &Uuid) -> String {
        format!("{}{}", Self::file_prefix(ns), id)
    }
    #[inline]
    pub fn file_prefix(ns: &str) -> String { format!("{}.docfs.file::", ns) }
    pub fn blob(ns: &str, id: &Uuid) -> String {
        format!("{}{}", Self::blob_prefix(ns), id)
    }
    #[inline]
    pub fn blob_prefix(ns: &str) -> String { format!("{}.docfs.blob::", ns) }

    /// Recover the id from a key built by one of the builders above.
    pub fn id_from(key: &str, prefix: &str) -> Option<Uuid> {
        key.strip_prefix(prefix).and_then(|rest| Uuid::parse_str(rest).ok())
    }
}
