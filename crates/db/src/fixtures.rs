use chrono::{DateTime, Duration, Utc};

use leadcall_core::domain::lead::{Lead, LeadId, PropertyDetails};

use crate::repositories::{LeadRepository, RepositoryError};

/// Demo leads for local runs, one per sample listing.
const DEMO_LEADS: &[DemoLead] = &[
    DemoLead {
        id: "demo-lp001",
        contact_person: "Rajesh Sharma",
        phone_number: "+91-9876543210",
        email: "rajesh.sharma@email.com",
        property_name: "Oberoi Sky City",
        location: "Borivali East",
        price_crores: 4.2,
        bedrooms: 3,
        bathrooms: 3,
        area_sqft: 1850,
        property_type: "Apartment",
        builder: "Oberoi Realty",
        possession_status: "Ready to Move",
        amenities: "Swimming Pool, Gym, Club House, Security",
        notes: "Interested in 3BHK",
        priority: 2,
    },
    DemoLead {
        id: "demo-lp002",
        contact_person: "Sneha Kulkarni",
        phone_number: "98201 44556",
        email: "sneha.k@email.com",
        property_name: "Lodha Amara",
        location: "Thane West",
        price_crores: 1.35,
        bedrooms: 2,
        bathrooms: 2,
        area_sqft: 780,
        property_type: "Apartment",
        builder: "Lodha Group",
        possession_status: "Under Construction",
        amenities: "Jogging Track, Kids Play Area, Clubhouse",
        notes: "",
        priority: 1,
    },
    DemoLead {
        id: "demo-lp003",
        contact_person: "Arjun Mehta",
        phone_number: "919833012345",
        email: "arjun.mehta@email.com",
        property_name: "Godrej Woods",
        location: "Sector 43, Noida",
        price_crores: 2.1,
        bedrooms: 3,
        bathrooms: 2,
        area_sqft: 1450,
        property_type: "Apartment",
        builder: "Godrej Properties",
        possession_status: "Ready to Move",
        amenities: "Forest Trail, Gym, Co-working Lounge",
        notes: "Prefers evening calls",
        priority: 0,
    },
];

struct DemoLead {
    id: &'static str,
    contact_person: &'static str,
    phone_number: &'static str,
    email: &'static str,
    property_name: &'static str,
    location: &'static str,
    price_crores: f64,
    bedrooms: u32,
    bathrooms: u32,
    area_sqft: u32,
    property_type: &'static str,
    builder: &'static str,
    possession_status: &'static str,
    amenities: &'static str,
    notes: &'static str,
    priority: i64,
}

impl DemoLead {
    fn to_lead(&self, created_at: DateTime<Utc>, user_id: Option<&str>) -> Lead {
        let mut lead = Lead::new(
            LeadId(self.id.to_string()),
            self.contact_person,
            self.phone_number,
            created_at,
        );
        lead.user_id = user_id.map(str::to_string);
        lead.email = Some(self.email.to_string());
        lead.property = PropertyDetails {
            property_name: Some(self.property_name.to_string()),
            location: Some(self.location.to_string()),
            price_crores: Some(self.price_crores),
            bedrooms: Some(self.bedrooms),
            bathrooms: Some(self.bathrooms),
            area_sqft: Some(self.area_sqft),
            property_type: Some(self.property_type.to_string()),
            builder: Some(self.builder.to_string()),
            possession_status: Some(self.possession_status.to_string()),
            amenities: Some(self.amenities.to_string()),
        };
        lead.notes = (!self.notes.is_empty()).then(|| self.notes.to_string());
        lead.priority = self.priority;
        lead
    }
}

/// Fresh `to_call` copies of the demo leads, created one minute apart so
/// selection order is stable.
pub fn demo_leads(now: DateTime<Utc>, user_id: Option<&str>) -> Vec<Lead> {
    DEMO_LEADS
        .iter()
        .enumerate()
        .map(|(index, demo)| demo.to_lead(now + Duration::minutes(index as i64), user_id))
        .collect()
}

/// Upserts the demo leads, resetting any previous call history on them.
pub async fn seed_demo_leads(
    repo: &dyn LeadRepository,
    now: DateTime<Utc>,
    user_id: Option<&str>,
) -> Result<Vec<LeadId>, RepositoryError> {
    let mut seeded = Vec::with_capacity(DEMO_LEADS.len());
    for lead in demo_leads(now, user_id) {
        seeded.push(lead.id.clone());
        repo.save(lead).await?;
    }
    Ok(seeded)
}
