use approx::assert_relative_eq;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use retarget::{prelude::*, scale::normalize};

const DASH_CONFIG: &str = include_str!("../../../config/dash/smplx_to_dash.json");

fn dash() -> RetargetConfig {
    RetargetConfig::from_json_str(DASH_CONFIG).unwrap()
}

fn standing_frame() -> HumanFrame {
    [
        ("pelvis", Vector3::new(0.0, 0.0, 1.0)),
        ("left_hip", Vector3::new(0.1, 0.0, 0.95)),
        ("right_hip", Vector3::new(-0.1, 0.0, 0.95)),
        ("left_knee", Vector3::new(0.1, 0.0, 0.5)),
        ("right_knee", Vector3::new(-0.1, 0.0, 0.5)),
        ("left_foot", Vector3::new(0.1, 0.05, 0.0)),
        ("right_foot", Vector3::new(-0.1, 0.05, 0.0)),
        ("left_shoulder", Vector3::new(0.2, 0.0, 1.45)),
        ("right_shoulder", Vector3::new(-0.2, 0.0, 1.45)),
        ("left_elbow", Vector3::new(0.25, 0.0, 1.15)),
        ("right_elbow", Vector3::new(-0.25, 0.0, 1.15)),
        ("left_wrist", Vector3::new(0.25, 0.1, 0.9)),
        ("right_wrist", Vector3::new(-0.25, 0.1, 0.9)),
        ("jaw", Vector3::new(0.0, 0.05, 1.65)),
    ]
    .into_iter()
    .map(|(body, position)| (body, BodyPose::at(position)))
    .collect()
}

#[test]
fn dash_config_is_usable() {
    let config = dash();

    let warnings = config.validate();
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");

    let session = RetargetSession::new(&config, None);
    assert!(session.is_ok());
}

#[test]
fn pelvis_is_scaled_from_origin() {
    let scale: ScaleTable = [("pelvis", 0.55)].into_iter().collect();
    let frame: HumanFrame = [("pelvis", BodyPose::at(Vector3::new(0.0, 0.0, 1.0)))]
        .into_iter()
        .collect();

    let scaled = normalize(&frame, &scale, "pelvis", 1.8, 1.8).unwrap().unwrap();
    assert_relative_eq!(
        scaled.get("pelvis").unwrap().position,
        Vector3::new(0.0, 0.0, 0.55),
        epsilon = 1e-12
    );
}

#[test]
fn full_frame_targets_every_body() {
    let config = dash();
    let mut session = RetargetSession::new(&config, None).unwrap();

    let frame = session.process(&standing_frame());
    assert_eq!(frame.targets.len(), 13);
    assert!(frame.missing.is_empty());

    // both tables contribute to the torso, 20 from table 1 and 10 from table 2
    let torso = &frame.targets["torso"];
    assert_eq!(torso.contributions.len(), 2);
    assert_relative_eq!(torso.rotation_weight, 30.0);
    assert_relative_eq!(torso.position, Vector3::new(0.0, 0.0, 0.6), epsilon = 1e-12);

    let offset = UnitQuaternion::from_quaternion(Quaternion::new(0.5, -0.5, -0.5, -0.5));
    assert_relative_eq!(torso.rotation, offset, epsilon = 1e-12);

    // feet keep their displacement from the pelvis, scaled by 0.6
    let foot = &frame.targets["r_foot"];
    assert_relative_eq!(foot.position, Vector3::new(-0.06, 0.03, 0.0), epsilon = 1e-12);
}

#[test]
fn missing_body_is_dropped_for_that_frame_only() {
    let config = dash();
    let mut session = RetargetSession::new(&config, None).unwrap();

    let without_wrist: HumanFrame = standing_frame()
        .iter()
        .filter(|(body, _)| *body != "left_wrist")
        .map(|(body, pose)| (body.to_string(), *pose))
        .collect();

    let clip = MotionClip {
        fps: 30.0,
        human_height: None,
        frames: vec![standing_frame(), without_wrist, standing_frame()],
    };

    let frames = session.process_clip(&clip);
    assert_eq!(frames.len(), 3);
    assert!(frames[0].targets.contains_key("l_lower_arm"));
    assert!(!frames[1].targets.contains_key("l_lower_arm"));
    assert_eq!(frames[1].targets.len(), 12);
    assert!(frames[2].targets.contains_key("l_lower_arm"));

    let report = session.into_report();
    assert_eq!(report.frames, 3);
    // once per table
    assert_eq!(report.total_omissions(), 2);
    assert!(
        report
            .omissions
            .keys()
            .all(|missing| missing.robot_body == "l_lower_arm")
    );
}

#[test]
fn disabled_secondary_table_is_ignored() {
    let contents = DASH_CONFIG.replace(
        r#""use_ik_match_table2": true"#,
        r#""use_ik_match_table2": false"#,
    );
    let config = RetargetConfig::from_json_str(&contents).unwrap();
    assert!(config.validate().contains(&Warning::SecondaryTableDisabled { entries: 13 }));

    let mut session = RetargetSession::new(&config, None).unwrap();
    let frame = session.process(&standing_frame());

    let foot = &frame.targets["r_foot"];
    assert_relative_eq!(foot.rotation_weight, 30.0);
    assert_eq!(foot.contributions.len(), 1);
    assert!(foot.contribution(TableId::Secondary).is_none());
}

#[test]
fn subject_height_scales_targets() {
    let config = dash();
    let mut session = RetargetSession::new(&config, Some(0.9)).unwrap();

    let frame = session.process(&standing_frame());
    assert_relative_eq!(
        frame.targets["torso"].position,
        Vector3::new(0.0, 0.0, 0.3),
        epsilon = 1e-12
    );
}

#[test]
fn targets_survive_a_save() {
    let config = dash();
    let clip = MotionClip {
        fps: 30.0,
        human_height: Some(1.8),
        frames: vec![standing_frame(); 4],
    };

    let mut session = RetargetSession::new(&config, clip.human_height).unwrap();
    let frames = session.process_clip(&clip);
    let document = TargetDocument::new(&config.robot_root_name, clip.fps, &frames);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("standing_targets.json");
    document.save(&path).unwrap();

    let loaded = TargetDocument::load(&path).unwrap();
    assert!(loaded.is_complete_for(clip.frames.len()));
    assert_eq!(loaded.frames[0].targets.len(), 13);
    assert_eq!(loaded.frames[0].targets["l_foot"].contributions.len(), 2);
}
