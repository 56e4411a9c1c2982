use serde_json::{json, Value};
use std::sync::Arc;
use switchboard::auth::{AuthOptions, AuthSpec};
use switchboard::endpoint::{Controller, EndpointMeta};
use switchboard::error::ServiceError;
use tracing::info;

/// Protected fleet status under `/v1/fleet`.
///
/// Listing accepts either configured provider (JWT first, then Basic);
/// launch clearance additionally requires the `ops` role on whichever
/// provider authenticated the caller.
pub struct FleetController;

const SHIPS: &[(&str, &str)] = &[
    ("nostromo", "docked"),
    ("sulaco", "patrol"),
    ("narcissus", "maintenance"),
];

impl Controller for FleetController {
    fn mount_path(&self) -> &str {
        "/v1/fleet"
    }

    fn endpoints(self: Arc<Self>) -> Vec<EndpointMeta> {
        vec![
            EndpointMeta::get("list_fleet", "")
                .auth(AuthSpec::providers(["jwt", "basic"]))
                .principal()
                .handler(|args| {
                    let principal = args
                        .principal(0)?
                        .ok_or_else(|| ServiceError::internal("principal missing"))?;
                    let ships: Vec<Value> = SHIPS
                        .iter()
                        .map(|(callsign, status)| json!({ "callsign": callsign, "status": status }))
                        .collect();
                    Ok(Some(json!({
                        "ships": ships,
                        "cleared_by": principal.login_name(),
                    })))
                }),
            EndpointMeta::post("launch_ship", "/:callsign/launch")
                .auth(AuthSpec::constrained([
                    ("jwt", AuthOptions::role("ops")),
                    ("basic", AuthOptions::role("ops")),
                ]))
                .path_param("callsign")
                .principal()
                .handler(|args| {
                    let callsign = args.text(0)?;
                    let principal = args
                        .principal(1)?
                        .ok_or_else(|| ServiceError::internal("principal missing"))?;
                    if !SHIPS.iter().any(|(name, _)| *name == callsign) {
                        return Err(
                            ServiceError::not_found(format!("ship <{callsign}> is unknown")).into()
                        );
                    }
                    info!(%callsign, by = principal.login_name(), "launch authorized");
                    Ok(Some(json!({
                        "callsign": callsign,
                        "status": "launched",
                        "authorized_by": principal.login_name(),
                    })))
                }),
        ]
    }
}
