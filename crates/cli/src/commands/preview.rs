use leadcall_core::domain::lead::Lead;
use leadcall_core::phone::PhoneFormatter;
use leadcall_db::{LeadQuery, LeadRepository, SqlLeadRepository};
use serde::Serialize;

use crate::commands::{with_migrated_store, CommandResult};

#[derive(Debug, Serialize)]
struct PreviewRow {
    lead_id: String,
    contact_person: String,
    status: String,
    priority: i64,
    follow_up_count: u32,
    dial_number: Option<String>,
}

impl PreviewRow {
    fn from_lead(lead: Lead, formatter: &PhoneFormatter) -> Self {
        Self {
            dial_number: formatter.format(&lead.phone_number),
            lead_id: lead.id.0,
            contact_person: lead.contact_person,
            status: lead.status.as_str().to_string(),
            priority: lead.priority,
            follow_up_count: lead.follow_up_count,
        }
    }
}

pub fn run(limit: Option<u32>, user_id: Option<String>) -> CommandResult {
    let rows = with_migrated_store("preview", |config, pool| async move {
        let limit = limit.unwrap_or(config.dispatch.default_lead_limit);
        let query = match user_id {
            Some(user_id) => LeadQuery::new(limit).for_user(user_id),
            None => LeadQuery::new(limit),
        };
        let formatter = PhoneFormatter::new(config.dispatch.default_country_code.clone());
        let leads = SqlLeadRepository::new(pool)
            .list_dialable(&query)
            .await
            .map_err(|error| ("lead_selection", error.to_string(), 6u8))?;
        Ok(leads
            .into_iter()
            .map(|lead| PreviewRow::from_lead(lead, &formatter))
            .collect::<Vec<_>>())
    });

    match rows {
        Ok(rows) => {
            let undialable = rows.iter().filter(|row| row.dial_number.is_none()).count();
            let message = preview_message(rows.len(), undialable);
            let data = serde_json::to_value(&rows).ok();
            CommandResult::success_with_data("preview", message, data)
        }
        Err(failure) => failure,
    }
}

fn preview_message(selected: usize, undialable: usize) -> String {
    match (selected, undialable) {
        (0, _) => "No leads available for calling".to_string(),
        (selected, 0) => format!("{selected} leads would be dialed"),
        (selected, undialable) => format!(
            "{selected} leads would be dialed; {undialable} will fail on an invalid phone number"
        ),
    }
}
