use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use switchboard::binder::{FilterOp, SearchQuery, SortDirection};
use switchboard::endpoint::{Controller, EndpointMeta};
use switchboard::error::ServiceError;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewMember {
    pub name: String,
    pub station: String,
    pub rank: String,
    #[serde(default)]
    pub flight_hours: u64,
}

/// Roster CRUD under `/v1/crew`, backed by an in-memory table.
///
/// Exercises path, search-query, body and reply bindings plus the `summary`
/// view (`?view=summary` strips everything but name and station).
pub struct CrewController {
    roster: Mutex<Vec<CrewMember>>,
}

impl CrewController {
    pub fn new() -> Self {
        Self {
            roster: Mutex::new(seed_roster()),
        }
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Vec<CrewMember>>> {
        self.roster.lock().map_err(|_| anyhow!("roster lock poisoned"))
    }

    fn get_member(&self, name: &str) -> anyhow::Result<Option<Value>> {
        let roster = self.lock()?;
        let member = roster
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| ServiceError::not_found(format!("crew member <{name}> is unknown")))?;
        Ok(Some(serde_json::to_value(member)?))
    }

    fn list_members(&self, search: &SearchQuery) -> anyhow::Result<Option<Value>> {
        let roster = self.lock()?;
        let mut selected: Vec<&CrewMember> = roster
            .iter()
            .filter(|member| matches_filters(member, search))
            .collect();
        // apply sort keys back to front so the first declared key dominates
        for (field, direction) in search.sort().iter().rev() {
            selected.sort_by(|a, b| {
                let ordering = field_text(a, field).cmp(&field_text(b, field));
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        let offset = search.offset().unwrap_or(0) as usize;
        let limit = search.limit().map_or(usize::MAX, |l| l as usize);
        let page: Vec<&CrewMember> = selected.into_iter().skip(offset).take(limit).collect();
        Ok(Some(serde_json::to_value(page)?))
    }

    fn create_member(&self, member: CrewMember) -> anyhow::Result<Value> {
        if member.name.is_empty() {
            return Err(ServiceError::bad_request("crew member name must not be empty").into());
        }
        let mut roster = self.lock()?;
        if roster.iter().any(|m| m.name == member.name) {
            return Err(ServiceError::new(
                409,
                format!("crew member <{}> already exists", member.name),
            )
            .into());
        }
        info!(name = %member.name, station = %member.station, "crew member added");
        let value = serde_json::to_value(&member)?;
        roster.push(member);
        Ok(value)
    }

    fn delete_member(&self, name: &str) -> anyhow::Result<Option<Value>> {
        let mut roster = self.lock()?;
        let before = roster.len();
        roster.retain(|m| m.name != name);
        if roster.len() == before {
            return Err(ServiceError::not_found(format!("crew member <{name}> is unknown")).into());
        }
        info!(%name, "crew member removed");
        Ok(None)
    }
}

impl Controller for CrewController {
    fn mount_path(&self) -> &str {
        "/v1/crew"
    }

    fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta> {
        let get = Arc::clone(&self);
        let list = Arc::clone(&self);
        let create = Arc::clone(&self);
        let delete = Arc::clone(&self);

        vec![
            EndpointMeta::get("get_crew_member", "/:name")
                .path_param("name")
                .view("summary", summary_view)
                .handler(move |args| get.get_member(args.text(0)?)),
            EndpointMeta::get("list_crew", "")
                .search()
                .view("summary", |value| match value {
                    Value::Array(members) => {
                        Value::Array(members.into_iter().map(summary_view).collect())
                    }
                    other => other,
                })
                .handler(move |args| list.list_members(args.search(0)?)),
            EndpointMeta::post("create_crew_member", "")
                .body::<CrewMember>()
                .reply()
                .handler(move |args| {
                    let member: CrewMember = args.body(0)?;
                    let reply = args.reply(1)?;
                    let created = create.create_member(member)?;
                    reply.status(201);
                    Ok(Some(created))
                }),
            EndpointMeta::delete("delete_crew_member", "/:name")
                .path_param("name")
                .handler(move |args| delete.delete_member(args.text(0)?)),
        ]
    }
}

fn summary_view(value: Value) -> Value {
    json!({ "name": value["name"], "station": value["station"] })
}

/// Render a member field as comparable text; numbers keep decimal form.
fn field_text(member: &CrewMember, field: &str) -> String {
    match field {
        "name" => member.name.clone(),
        "station" => member.station.clone(),
        "rank" => member.rank.clone(),
        "flight_hours" => member.flight_hours.to_string(),
        _ => String::new(),
    }
}

fn matches_filters(member: &CrewMember, search: &SearchQuery) -> bool {
    search.filters().iter().all(|(field, op)| {
        let text = field_text(member, field);
        match op {
            FilterOp::Eq(expected) => text == *expected,
            FilterOp::Regex(regex) => regex.is_match(&text),
        }
    })
}

fn seed_roster() -> Vec<CrewMember> {
    vec![
        CrewMember {
            name: "ripley".to_string(),
            station: "bridge".to_string(),
            rank: "commander".to_string(),
            flight_hours: 12400,
        },
        CrewMember {
            name: "kane".to_string(),
            station: "navigation".to_string(),
            rank: "officer".to_string(),
            flight_hours: 8300,
        },
        CrewMember {
            name: "lambert".to_string(),
            station: "engineering".to_string(),
            rank: "technician".to_string(),
            flight_hours: 5100,
        },
    ]
}
