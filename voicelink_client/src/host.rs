//! Boundary to the game. Everything the client needs from the world, and every
//! side effect it can cause, goes through these traits.
//!
//! [`HostApi`] is safe to call from the client's own threads and only answers
//! questions. Anything that changes game state lives on [`HostContext`], which
//! the host hands out only while running a task on its main thread.

use crate::protocol::{FormId, ItemKind, ShoutEntry};

pub type ActorHandle = u32;

pub type HostTask = Box<dyn FnOnce(&dyn HostContext) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let (dx, dy, dz) = (other.x - self.x, other.y - self.y, other.z - self.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// The player: where they stand and which way they face (yaw in radians,
/// 0 = +y, clockwise towards +x).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    pub position: Vec3,
    pub yaw: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorView {
    pub handle: ActorHandle,
    pub name: String,
    pub position: Vec3,
    pub dead: bool,
    pub hostile: bool,
    pub is_observer: bool,
}

/// Where a plugin sits in the load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginSlot {
    Full(u8),
    Light(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Shout,
    Spell,
    /// Lesser power or racial power: magic cast through the voice slot.
    Power,
    Weapon,
    Potion,
    Poison,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteMagic {
    pub form_id: FormId,
    pub name: String,
    pub is_power: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteItem {
    pub form_id: FormId,
    pub name: String,
    pub kind: FormKind,
    pub count: u32,
}

/// Read-only queries, callable from any thread.
pub trait HostApi: Send + Sync {
    fn is_paused(&self) -> bool;
    fn observer(&self) -> Option<Observer>;
    /// Actors currently loaded around the observer, in host order.
    fn nearby_actors(&self) -> Vec<ActorView>;
    fn actor(&self, handle: ActorHandle) -> Option<ActorView>;
    /// Topic texts of the open dialogue, in menu order. Entries may be empty.
    fn dialogue_options(&self) -> Vec<String>;
    /// Queue a one-shot task on the host's main thread.
    fn schedule(&self, task: HostTask);
}

/// Main-thread services, valid only inside a scheduled [`HostTask`].
pub trait HostContext {
    fn notify(&self, text: &str);

    fn activate(&self, target: ActorHandle) -> bool;
    fn select_dialogue_option(&self, index: usize) -> bool;
    fn close_dialogue(&self) -> bool;
    fn stop_observer_voice(&self) -> usize;

    fn plugin_slot(&self, plugin: &str) -> Option<PluginSlot>;
    fn form_kind(&self, form: FormId) -> Option<FormKind>;
    fn display_name(&self, form: FormId) -> Option<String>;
    fn item_count(&self, form: FormId) -> u32;
    fn knows_spell(&self, form: FormId) -> bool;
    /// Known shout with an unlocked variation for `power`.
    fn knows_shout(&self, form: FormId, power: u8) -> bool;

    fn equip_shout(&self, form: FormId) -> bool;
    /// Presses the shout key long enough for `power` words; 1 is a tap.
    fn press_shout_key(&self, power: u8) -> bool;
    fn equip_power(&self, form: FormId) -> bool;
    fn equip_weapon(&self, form: FormId) -> bool;
    fn equip_spell(&self, form: FormId) -> bool;
    fn consume_potion(&self, form: FormId) -> bool;

    fn favorite_shouts(&self) -> Vec<ShoutEntry>;
    fn favorite_magic(&self) -> Vec<FavoriteMagic>;
    fn favorite_items(&self) -> Vec<FavoriteItem>;
}

impl FormKind {
    pub fn matches_item(self, item: ItemKind) -> bool {
        matches!(
            (self, item),
            (FormKind::Weapon, ItemKind::Weapon)
                | (FormKind::Spell, ItemKind::Spell)
                | (FormKind::Potion, ItemKind::Potion)
        )
    }
}
