use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::agent::{Agent, Fate};
use super::clock::SimulationClock;
use super::raster::Raster;
use super::tools::ToolInventory;

/// Everything needed to resume an attempt of the same level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub level_name: String,
    pub rescued: u32,
    pub released: usize,
    pub nuked: bool,
    pub inventory: ToolInventory,
    pub clock: SimulationClock,
    pub agents: Vec<Agent>,
    pub collision: Raster,
    pub visual: Option<Raster>,
}

/// Hex sha256 over the terrain pixels and the simulation-relevant agent
/// fields. Names are cosmetic and left out.
pub fn state_digest(collision: &Raster, agents: &[Agent]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collision.width().to_le_bytes());
    hasher.update(collision.height().to_le_bytes());
    hasher.update(collision.as_bytes());
    for agent in agents {
        hash_agent(&mut hasher, agent);
    }
    to_hex_lower(&hasher.finalize())
}

fn hash_agent(hasher: &mut Sha256, agent: &Agent) {
    for value in [
        agent.x,
        agent.y,
        agent.fallen_distance,
        agent.animation.elapsed_ms,
        agent.countdown.elapsed_ms,
    ] {
        hasher.update(value.to_bits().to_le_bytes());
    }
    for value in [
        agent.animation.frame,
        agent.countdown.frame,
        agent.turn_cooldown,
        agent.progress.slabs_placed,
        agent.progress.stall_count,
        agent.progress.edge_stall_count,
    ] {
        hasher.update(value.to_le_bytes());
    }
    hasher.update(agent.state.label().as_bytes());
    hasher.update([
        agent.facing.sign() as i8 as u8,
        agent.capability as u8,
        u8::from(agent.active),
        u8::from(agent.countdown.active),
        u8::from(agent.death_pending),
        u8::from(agent.collision_box),
        u8::from(agent.walking_on_slab),
        u8::from(agent.nuked),
        fate_tag(agent.fate),
    ]);
}

fn fate_tag(fate: Option<Fate>) -> u8 {
    match fate {
        None => 0,
        Some(Fate::Rescued) => 1,
        Some(Fate::Hazard) => 2,
        Some(Fate::FellToDeath) => 3,
        Some(Fate::Exploded) => 4,
        Some(Fate::OutOfBounds) => 5,
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
