//! The catalog of named actions an entity may be permitted to perform.

/// Static description of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDef {
    pub name: &'static str,
    /// Must name another entity in the actor's room.
    pub needs_target: bool,
    /// Health removed from the target.
    pub damage: u32,
    /// Third-person verb used in narration.
    pub verb: &'static str,
}

/// Moves the actor through a random walkable exit.
pub const FLEE: &str = "flee";

pub const CATALOG: &[ActionDef] = &[
    ActionDef {
        name: "bite",
        needs_target: true,
        damage: 3,
        verb: "bites",
    },
    ActionDef {
        name: "sting",
        needs_target: true,
        damage: 5,
        verb: "stings",
    },
    ActionDef {
        name: "spit",
        needs_target: false,
        damage: 0,
        verb: "spits",
    },
    ActionDef {
        name: FLEE,
        needs_target: false,
        damage: 0,
        verb: "flees",
    },
];

/// Looks up an action by name.
pub fn lookup(name: &str) -> Option<&'static ActionDef> {
    CATALOG.iter().find(|def| def.name == name)
}

/// Actions a freshly registered player may use.
pub fn default_player_actions() -> [&'static str; 3] {
    ["bite", "spit", FLEE]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("bite").map(|d| d.damage), Some(3));
        assert!(lookup("spit").is_some_and(|d| !d.needs_target));
        assert!(lookup("dance").is_none());
    }

    #[test]
    fn test_default_player_actions_are_in_catalog() {
        for name in default_player_actions() {
            assert!(lookup(name).is_some(), "{name}");
        }
    }
}
