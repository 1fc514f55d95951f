use slotmap::new_key_type;

// Keys into the sketch store's arenas. A key whose slot has been removed stays
// distinguishable from any key inserted later, so stale references held by
// constraints can be detected instead of silently aliasing new entities.
new_key_type! {
    pub struct EntityId;
    pub struct ConstraintId;
    pub struct SketchId;
}
