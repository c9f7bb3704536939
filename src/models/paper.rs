/// A paper parsed from one feed `<entry>`. Only `id` is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paper {
    /// Feed-assigned URI, e.g. `http://arxiv.org/abs/2401.00001v1`
    pub id: String,
    pub updated: String,
    pub published: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
}
