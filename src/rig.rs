//! Bone naming conversion between Mixamo and VRM skeletons.

use crate::scene::{Armature, ObjectId, ObjectKind, SceneError, SceneState};

pub const MIXAMO_PREFIX: &str = "mixamorig:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigConvention {
    Mixamo,
    Vrm,
}

impl RigConvention {
    pub fn object_name(&self) -> &'static str {
        match self {
            Self::Mixamo => "Mixamo RIG",
            Self::Vrm => "VRM RIG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RigDirection {
    #[default]
    Auto,
    ToVrm,
    ToMixamo,
}

impl std::str::FromStr for RigDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "vrm" | "to-vrm" => Ok(Self::ToVrm),
            "mixamo" | "to-mixamo" => Ok(Self::ToMixamo),
            other => Err(format!("unknown rig direction '{}'", other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RigError {
    #[error("please select an armature")]
    NotAnArmature,
    #[error("could not detect rig type")]
    Undetected,
    #[error(transparent)]
    Scene(#[from] SceneError),
}

const VRM_MARKERS: [&str; 5] = ["hips", "spine", "chest", "neck", "head"];

const FINGERS: [(&str, &str); 5] = [
    ("Thumb", "thumb"),
    ("Index", "index"),
    ("Middle", "middle"),
    ("Ring", "ring"),
    ("Pinky", "little"),
];

const PHALANGES: [&str; 3] = ["proximal", "intermediate", "distal"];

/// `(mixamo, vrm)` bone name pairs. Names that contain another entry's
/// pattern come first so substring matching picks the most specific one.
fn bone_table() -> Vec<(String, String)> {
    let mut table: Vec<(String, String)> = [
        ("Hips", "hips"),
        ("Spine2", "upper_chest"),
        ("Spine1", "chest"),
        ("Neck", "neck"),
        ("Head", "head"),
    ]
    .iter()
    .map(|(mixamo, vrm)| (mixamo.to_string(), vrm.to_string()))
    .collect();

    for (side, suffix) in [("Left", "L"), ("Right", "R")] {
        table.push((format!("{}Eye", side), format!("eye.{}", suffix)));
        table.push((format!("{}Shoulder", side), format!("shoulder.{}", suffix)));
        table.push((format!("{}ForeArm", side), format!("lower_arm.{}", suffix)));
        table.push((format!("{}Arm", side), format!("upper_arm.{}", suffix)));
        for (mixamo_finger, vrm_finger) in FINGERS {
            for (i, phalanx) in PHALANGES.iter().enumerate() {
                table.push((
                    format!("{}Hand{}{}", side, mixamo_finger, i + 1),
                    format!("{}_{}.{}", vrm_finger, phalanx, suffix),
                ));
            }
        }
        table.push((format!("{}Hand", side), format!("hand.{}", suffix)));
        table.push((format!("{}UpLeg", side), format!("upper_leg.{}", suffix)));
        table.push((format!("{}Leg", side), format!("lower_leg.{}", suffix)));
        table.push((format!("{}Foot", side), format!("foot.{}", suffix)));
        table.push((format!("{}ToeBase", side), format!("toes.{}", suffix)));
    }
    table.push(("Spine".to_string(), "spine".to_string()));
    table
}

/// Decided by the first bone that carries a recognizable marker.
pub fn detect_convention(armature: &Armature) -> Option<RigConvention> {
    armature.bones.iter().find_map(|bone| {
        let lower = bone.name.to_lowercase();
        if lower.contains("mixamo") {
            Some(RigConvention::Mixamo)
        } else if VRM_MARKERS.iter().any(|marker| lower.contains(marker)) {
            Some(RigConvention::Vrm)
        } else {
            None
        }
    })
}

/// Converted name for one bone, `None` when no pattern matches.
pub fn convert_bone_name(name: &str, target: RigConvention) -> Option<String> {
    bone_table()
        .into_iter()
        .find_map(|(mixamo, vrm)| match target {
            RigConvention::Vrm => name.contains(mixamo.as_str()).then_some(vrm),
            RigConvention::Mixamo => name
                .contains(vrm.as_str())
                .then(|| format!("{}{}", MIXAMO_PREFIX, mixamo)),
        })
}

/// Renames the bones of `armature` and the armature object itself. Returns
/// the convention converted to.
pub fn convert_rig(
    scene: &mut SceneState,
    armature: ObjectId,
    direction: RigDirection,
) -> Result<RigConvention, RigError> {
    let object = scene.require_mut(armature)?;
    let ObjectKind::Armature(rig) = &mut object.kind else {
        return Err(RigError::NotAnArmature);
    };

    let target = match direction {
        RigDirection::ToVrm => RigConvention::Vrm,
        RigDirection::ToMixamo => RigConvention::Mixamo,
        RigDirection::Auto => match detect_convention(rig).ok_or(RigError::Undetected)? {
            RigConvention::Mixamo => RigConvention::Vrm,
            RigConvention::Vrm => RigConvention::Mixamo,
        },
    };

    let mut renamed = 0;
    for bone in &mut rig.bones {
        if let Some(name) = convert_bone_name(&bone.name, target) {
            bone.name = name;
            renamed += 1;
        }
    }
    object.name = target.object_name().to_string();
    log::info!(
        "Converted rig to {} ({} of {} bones renamed)",
        target.object_name(),
        renamed,
        rig.bones.len()
    );
    Ok(target)
}
