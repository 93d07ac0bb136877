//! SQLite schema definition

/// SQL schema for the search database
pub const SCHEMA_SQL: &str = r#"
-- Sites: one row per crawl target
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    status TEXT NOT NULL CHECK (status IN ('INDEXING', 'INDEXED', 'FAILED')),
    status_time TEXT NOT NULL,
    last_error TEXT,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

-- Pages: one row per fetched URL
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    code INTEGER NOT NULL,
    content TEXT NOT NULL,
    UNIQUE(site_id, path)
);

-- Lemmas: document frequency per site
CREATE TABLE IF NOT EXISTS lemmas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    lemma TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    UNIQUE(site_id, lemma)
);

-- Inverted index: weighted lemma occurrences per page
CREATE TABLE IF NOT EXISTS search_index (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lemma_id INTEGER NOT NULL REFERENCES lemmas(id) ON DELETE CASCADE,
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    rank REAL NOT NULL,
    UNIQUE(lemma_id, page_id)
);

CREATE INDEX IF NOT EXISTS idx_pages_site_code ON pages(site_id, code);
CREATE INDEX IF NOT EXISTS idx_index_page ON search_index(page_id);
"#;
