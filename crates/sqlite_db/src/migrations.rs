//! Forward-only schema history. Each entry is applied in order inside its
//! own transaction and advances `PRAGMA user_version`; a database that is
//! already past an entry skips it.

/// Numbered migrations; `DB_VERSION` in `lib.rs` must equal the last entry.
pub(crate) const MIGRATIONS: &[(u64, &str)] = &[
    (
        1,
        r#"
CREATE TABLE discovery_pages (
    offset INTEGER PRIMARY KEY,
    completed_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE discovery_entries (
    match_id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    offset INTEGER NOT NULL,
    forfeit_hint INTEGER NOT NULL DEFAULT 0,
    timestamp_ms INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    discovered_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE matches (
    match_id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    team1_id INTEGER NOT NULL,
    team1_name TEXT NOT NULL,
    team2_id INTEGER NOT NULL,
    team2_name TEXT NOT NULL,
    event_id INTEGER NOT NULL,
    event_name TEXT NOT NULL,
    team1_score INTEGER,
    team2_score INTEGER,
    best_of INTEGER NOT NULL,
    lan INTEGER NOT NULL DEFAULT 0,
    match_date TEXT NOT NULL,
    is_forfeit INTEGER NOT NULL DEFAULT 0,
    scraped_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE maps (
    match_id INTEGER NOT NULL,
    map_number INTEGER NOT NULL,
    map_name TEXT NOT NULL,
    mapstatsid INTEGER,
    team1_rounds INTEGER,
    team2_rounds INTEGER,
    team1_ct_rounds INTEGER,
    team1_t_rounds INTEGER,
    team2_ct_rounds INTEGER,
    team2_t_rounds INTEGER,
    is_unplayed INTEGER NOT NULL DEFAULT 0,
    scraped_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (match_id, map_number),
    FOREIGN KEY (match_id) REFERENCES matches(match_id)
);
CREATE TABLE veto_steps (
    match_id INTEGER NOT NULL,
    step_number INTEGER NOT NULL,
    action TEXT NOT NULL,
    team_name TEXT,
    map_name TEXT NOT NULL,
    scraped_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (match_id, step_number),
    FOREIGN KEY (match_id) REFERENCES matches(match_id)
);
CREATE TABLE match_players (
    match_id INTEGER NOT NULL,
    player_id INTEGER NOT NULL,
    player_name TEXT NOT NULL,
    team_id INTEGER NOT NULL,
    team_number INTEGER NOT NULL,
    scraped_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (match_id, player_id),
    FOREIGN KEY (match_id) REFERENCES matches(match_id)
);
CREATE TABLE player_stats (
    match_id INTEGER NOT NULL,
    map_number INTEGER NOT NULL,
    player_id INTEGER NOT NULL,
    player_name TEXT NOT NULL,
    team_id INTEGER NOT NULL,
    kills INTEGER,
    deaths INTEGER,
    assists INTEGER,
    flash_assists INTEGER,
    hs_kills INTEGER,
    kd_diff INTEGER,
    adr REAL,
    kast REAL,
    fk_diff INTEGER,
    rating REAL,
    opening_kills INTEGER,
    opening_deaths INTEGER,
    multi_kills INTEGER,
    clutch_wins INTEGER,
    traded_deaths INTEGER,
    round_swing REAL,
    kpr REAL,
    dpr REAL,
    mk_rating REAL,
    scraped_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (match_id, map_number, player_id),
    FOREIGN KEY (match_id, map_number) REFERENCES maps(match_id, map_number)
);
CREATE TABLE round_outcomes (
    match_id INTEGER NOT NULL,
    map_number INTEGER NOT NULL,
    round_number INTEGER NOT NULL,
    winner_team_id INTEGER NOT NULL,
    winner_side TEXT NOT NULL,
    win_type TEXT NOT NULL,
    scraped_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (match_id, map_number, round_number),
    FOREIGN KEY (match_id, map_number) REFERENCES maps(match_id, map_number)
);
CREATE TABLE round_economy (
    match_id INTEGER NOT NULL,
    map_number INTEGER NOT NULL,
    round_number INTEGER NOT NULL,
    team_id INTEGER NOT NULL,
    equipment_value INTEGER NOT NULL,
    buy_type TEXT NOT NULL,
    side TEXT NOT NULL,
    scraped_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (match_id, map_number, round_number, team_id),
    FOREIGN KEY (match_id, map_number, round_number)
        REFERENCES round_outcomes(match_id, map_number, round_number)
);
CREATE TABLE kill_matrix (
    match_id INTEGER NOT NULL,
    map_number INTEGER NOT NULL,
    matrix_type TEXT NOT NULL,
    row_player_id INTEGER NOT NULL,
    col_player_id INTEGER NOT NULL,
    row_kills INTEGER NOT NULL,
    col_kills INTEGER NOT NULL,
    scraped_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (match_id, map_number, matrix_type, row_player_id, col_player_id),
    FOREIGN KEY (match_id, map_number) REFERENCES maps(match_id, map_number)
);
"#,
    ),
    (
        2,
        r#"
CREATE TABLE quarantine (
    id INTEGER PRIMARY KEY,
    entity_type TEXT NOT NULL,
    match_id INTEGER,
    map_number INTEGER,
    payload TEXT NOT NULL,
    error TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    ),
    (
        3,
        r#"
CREATE INDEX idx_discovery_entries_status ON discovery_entries(status, match_id);
CREATE INDEX idx_maps_mapstatsid ON maps(mapstatsid) WHERE mapstatsid IS NOT NULL;
CREATE INDEX idx_player_stats_pending_perf ON player_stats(match_id, map_number) WHERE kpr IS NULL;
"#,
    ),
];
