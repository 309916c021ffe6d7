pub const POSTURE_FLOOR: u8 = 65;
pub const EYE_CONTACT_FLOOR: u8 = 60;
pub const MOVEMENT_FLOOR: u8 = 70;

pub const POSTURE_WEIGHT: f32 = 0.34;
pub const EYE_CONTACT_WEIGHT: f32 = 0.33;
pub const MOVEMENT_WEIGHT: f32 = 0.33;

/// Weighted combination of the three signal scores.
///
/// Each input is first raised to its floor.
pub fn aggregate(posture: u8, eye_contact: u8, movement: u8) -> u8 {
    let p = posture.max(POSTURE_FLOOR) as f32;
    let e = eye_contact.max(EYE_CONTACT_FLOOR) as f32;
    let m = movement.max(MOVEMENT_FLOOR) as f32;

    let combined = POSTURE_WEIGHT * p + EYE_CONTACT_WEIGHT * e + MOVEMENT_WEIGHT * m;
    combined.round().clamp(0.0, 100.0) as u8
}
