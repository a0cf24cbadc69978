//! Database schema and migrations for Folio.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded. Identifiers are stored as UUID text, timestamps as RFC 3339.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Folder tree
    r#"
CREATE TABLE folders (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    parent_id   TEXT REFERENCES folders(id) ON DELETE CASCADE,  -- NULL only for root
    created_at  TEXT NOT NULL,
    UNIQUE(parent_id, name)
);

CREATE INDEX idx_folders_parent_id ON folders(parent_id);
-- UNIQUE(parent_id, name) does not cover NULL parents
CREATE UNIQUE INDEX idx_folders_root_name ON folders(name) WHERE parent_id IS NULL;

CREATE TABLE folder_visibility_groups (
    folder_id   TEXT NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    group_id    TEXT NOT NULL,
    PRIMARY KEY (folder_id, group_id)
);
"#,
    // v2: Document metadata (payloads live in the object store)
    r#"
CREATE TABLE documents (
    id              TEXT PRIMARY KEY,
    folder_id       TEXT NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    media_type      TEXT NOT NULL,
    size            INTEGER NOT NULL,
    owner_id        TEXT,
    download_url    TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    UNIQUE(folder_id, name)
);

CREATE INDEX idx_documents_folder_id ON documents(folder_id);
CREATE INDEX idx_documents_owner_id ON documents(owner_id);
"#,
    // v3: Tags and document bindings
    r#"
CREATE TABLE tags (
    id      TEXT PRIMARY KEY,
    name    TEXT NOT NULL UNIQUE
);

CREATE TABLE document_tags (
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    tag_id      TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (document_id, tag_id)
);

CREATE INDEX idx_document_tags_tag_id ON document_tags(tag_id);
"#,
];
