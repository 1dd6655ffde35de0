mod snapshots;

pub use snapshots::SqliteSnapshotRepo;
