/// Guessing vanguard/assault/HQ roles from the gate graph of a spawn
use crate::clients::EsiApi;
use crate::domain::{IncursionLayout, NamedItem};
use crate::errors::{AbortReason, LayoutAbort};
use crate::utils::SystemQueue;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};

/// How many vanguard and assault sites a spawn of `number_of_systems` has.
/// Returns `(assaults, vanguards)`.
pub fn calculate_layout_amounts(number_of_systems: usize) -> (usize, usize) {
    // Staging, HQ and the one mandatory assault
    let mut vanguards = number_of_systems.saturating_sub(3);
    let mut assaults = 1;

    if vanguards > 3 {
        vanguards -= 1;
        assaults += 1;
    }

    if vanguards > 4 {
        vanguards -= 1;
        assaults += 1;
    }

    (assaults, vanguards)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Vanguard,
    Assault,
    Headquarters,
}

/// Breadth-first walk from the staging system. Systems nearer to staging get
/// vanguard roles first, then assault, and the next one after that is the HQ.
pub async fn classify(
    api: &dyn EsiApi,
    staging: &NamedItem,
    systems: &[i64],
) -> Result<IncursionLayout, LayoutAbort> {
    let (assaults, vanguards) = calculate_layout_amounts(systems.len());
    debug!(
        "Staging {}, should be {} vanguards and {} assaults",
        staging.id, vanguards, assaults
    );

    let valid: HashSet<i64> = systems.iter().copied().collect();
    let mut roles: Vec<(i64, Role)> = Vec::with_capacity(systems.len());

    let walk = walk_systems(api, staging.id, &valid, vanguards, assaults, &mut roles).await;
    let layout = build_layout(api, staging, &roles).await;

    match walk {
        Ok(()) => Ok(layout),
        Err(reason) => {
            // No HQ was assigned, so the partial layout reads as incomplete
            error!(
                "Stopped guessing layout for staging {}: {}",
                staging.id, reason
            );
            Err(LayoutAbort {
                staging_id: staging.id,
                reason,
                partial: layout,
            })
        }
    }
}

async fn walk_systems(
    api: &dyn EsiApi,
    staging_id: i64,
    valid: &HashSet<i64>,
    mut remaining_vanguards: usize,
    mut remaining_assaults: usize,
    roles: &mut Vec<(i64, Role)>,
) -> Result<(), AbortReason> {
    let mut queue = SystemQueue::new();
    queue.mark_seen(staging_id);

    let connections = api
        .get_stargate_connections(staging_id)
        .await
        .map_err(AbortReason::Lookup)?;
    for system in connections {
        if valid.contains(&system) {
            queue.push(system, 1);
        }
    }

    while let Some(current) = queue.pop() {
        if remaining_vanguards == 0 && remaining_assaults == 0 {
            debug!("Guessing {} is the HQ", current.system_id);
            roles.push((current.system_id, Role::Headquarters));
            return Ok(());
        }

        let role = if remaining_vanguards > 0 {
            remaining_vanguards -= 1;
            Role::Vanguard
        } else {
            remaining_assaults -= 1;
            Role::Assault
        };
        debug!("Guessing {} is {:?}", current.system_id, role);
        roles.push((current.system_id, role));

        let neighbours = api
            .get_stargate_connections(current.system_id)
            .await
            .map_err(AbortReason::Lookup)?;
        for system in neighbours {
            if valid.contains(&system) {
                queue.push(system, current.distance + 1);
            }
        }
    }

    Err(AbortReason::QueueExhausted)
}

async fn build_layout(
    api: &dyn EsiApi,
    staging: &NamedItem,
    roles: &[(i64, Role)],
) -> IncursionLayout {
    let mut ids: Vec<i64> = roles.iter().map(|(id, _)| *id).collect();
    if staging.name.is_empty() {
        ids.push(staging.id);
    }

    let names = match api.get_names(&ids).await {
        Ok(names) => names,
        Err(e) => {
            warn!("Couldn't resolve layout names for staging {}: {}", staging.id, e);
            HashMap::new()
        }
    };
    let named = |id: i64| NamedItem {
        id,
        name: names.get(&id).cloned().unwrap_or_default(),
    };

    let mut layout = IncursionLayout::with_staging(if staging.name.is_empty() {
        named(staging.id)
    } else {
        staging.clone()
    });

    for (id, role) in roles {
        match role {
            Role::Vanguard => layout.vanguard_systems.push(named(*id)),
            Role::Assault => layout.assault_systems.push(named(*id)),
            Role::Headquarters => layout.hq_system = named(*id),
        }
    }

    layout
}
