/// Short label code as stored in the corpus index.
/// Examples: `l`, `s`, `p1`, `XX`
pub type LabelCode = String;
/// Full label name from the corpus schema.
/// Examples: `login`, `search query`, `NOT ANNOTATED`
pub type LabelName = String;
/// Value of a field's `name` attribute.
/// Examples: `username`, `q`, `user[email]`
pub type FieldName = String;
/// Page content path relative to the corpus root.
/// Example: `html/example.org-0.html`
pub type RelativePath = String;
/// Source URL of a stored page.
/// Example: `https://accounts.example.co.uk/login?next=/`
pub type PageUrl = String;
/// Registrable domain without its public suffix, used as the fold group key.
/// Examples: `example`, `github`
pub type SiteDomain = String;
/// Canonical form serialization used for deduplication.
/// Example: `<form action="/go">\n<input name="q">\n</form>`
pub type Fingerprint = String;
/// Name of a feature slot or of a vectorized column.
/// Examples: `has <textarea>`, `<form method=post`, `input names__ user`
pub type FeatureName = String;
