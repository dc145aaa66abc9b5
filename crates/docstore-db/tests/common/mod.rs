use bson::doc;
use docstore_db::Collection;
use docstore_store::MemoryKv;

pub const COLLECTION: &str = "accounts";

pub fn new_collection(kv: &MemoryKv) -> Collection<'_, MemoryKv> {
    Collection::new(kv, COLLECTION)
}

/// Insert 5 seed records directly, mirroring the shape used across the
/// suite's scenario tests.
pub fn seed_records(kv: &MemoryKv) {
    let coll = new_collection(kv);
    coll.insert_many(
        vec![
            doc! { "_id": "acct-1", "name": "Acme Corp", "revenue": 50000.0, "status": "active" },
            doc! { "_id": "acct-2", "name": "Globex", "revenue": 80000.0, "status": "snoozed" },
            doc! { "_id": "acct-3", "name": "Initech", "revenue": 12000.0, "status": "rejected" },
            doc! { "_id": "acct-4", "name": "Umbrella", "revenue": 95000.0, "status": "active" },
            doc! { "_id": "acct-5", "name": "Stark Industries", "revenue": 200000.0, "status": "active" },
        ],
        true,
    );
}
