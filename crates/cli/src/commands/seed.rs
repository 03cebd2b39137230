use chrono::Utc;
use leadcall_db::fixtures::seed_demo_leads;
use leadcall_db::SqlLeadRepository;

use crate::commands::{with_migrated_store, CommandResult};

pub fn run(user_id: Option<String>) -> CommandResult {
    let seeded = with_migrated_store("seed", |_, pool| async move {
        let repo = SqlLeadRepository::new(pool);
        seed_demo_leads(&repo, Utc::now(), user_id.as_deref())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8))
    });

    match seeded {
        Ok(ids) => {
            let ids: Vec<String> = ids.into_iter().map(|id| id.0).collect();
            CommandResult::success_with_data(
                "seed",
                seed_message(&ids),
                Some(serde_json::json!({ "lead_ids": ids })),
            )
        }
        Err(failure) => failure,
    }
}

fn seed_message(ids: &[String]) -> String {
    if ids.is_empty() {
        "no demo leads were seeded".to_string()
    } else {
        format!("seeded {} demo leads ready to call: {}", ids.len(), ids.join(", "))
    }
}
