//! Body tree of a robot model in MJCF (`MuJoCo` XML) format.
//!
//! Only the parts needed to write and check retargeting configurations are read: body names,
//! their placement in the kinematic tree, and the joints between them. Geometry, actuators and
//! simulation options are skipped.
use std::{fs, io::BufRead, path::Path};

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use crate::{BodyClass, Error, Result};

/// A robot body with its pose relative to its parent and to the world.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotBody {
    pub name: String,
    /// Nearest named ancestor, `None` for bodies directly below `<worldbody>`.
    pub parent: Option<String>,
    pub local: Isometry3<f64>,
    /// Pose in the default configuration, with every joint at zero.
    pub world: Isometry3<f64>,
    pub joints: Vec<RobotJoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RobotJoint {
    pub name: Option<String>,
    /// MJCF joint type, `hinge` unless the model says otherwise.
    pub kind: String,
    pub axis: Vector3<f64>,
    pub range: Option<(f64, f64)>,
}

/// The bodies of a robot model, parents before children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotModel {
    pub name: Option<String>,
    pub bodies: Vec<RobotBody>,
}

impl RobotModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(Error::io(path))?;
        let model = Self::from_xml_str(&xml)?;

        tracing::debug!(
            path = %path.display(),
            bodies = model.bodies.len(),
            "loaded robot model"
        );
        Ok(model)
    }

    pub fn from_xml_str(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) if e.name().as_ref() == b"mujoco" => {
                    let name = attribute(e, "model");
                    let bodies = parse_mujoco(&mut reader)?;
                    return Ok(Self { name, bodies });
                }
                Ok(Event::Eof) => return Err(Error::model("no <mujoco> element")),
                Ok(_) => {}
                Err(e) => return Err(Error::model(e.to_string())),
            }
            buf.clear();
        }
    }

    pub fn body_names(&self) -> impl Iterator<Item = &str> {
        self.bodies.iter().map(|body| body.name.as_str())
    }

    #[must_use]
    pub fn body(&self, name: &str) -> Option<&RobotBody> {
        self.bodies.iter().find(|body| body.name == name)
    }

    /// Standing height, from the lowest foot to the highest body origin.
    ///
    /// Returns `None` when the model has no foot bodies, or nothing above them.
    #[must_use]
    pub fn estimate_height(&self) -> Option<f64> {
        let lowest_foot = self
            .bodies
            .iter()
            .filter(|body| BodyClass::classify(&body.name) == BodyClass::Foot)
            .map(|body| body.world.translation.z)
            .reduce(f64::min)?;
        let highest = self
            .bodies
            .iter()
            .map(|body| body.world.translation.z)
            .reduce(f64::max)?;

        let height = highest - lowest_foot;
        (height > 0.0).then_some(height)
    }
}

fn parse_mujoco<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<RobotBody>> {
    let mut bodies = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                if name == b"worldbody" {
                    parse_contents(reader, b"worldbody", None, &Isometry3::identity(), &mut bodies)?;
                } else {
                    skip_element(reader, &name)?;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"mujoco" => break,
            Ok(Event::Eof) => return Err(Error::model("unexpected end of file in <mujoco>")),
            Ok(_) => {}
            Err(e) => return Err(Error::model(e.to_string())),
        }
        buf.clear();
    }

    Ok(bodies)
}

/// Read the children of `<worldbody>` or a `<body>`, up to the closing `end` tag.
///
/// Bodies are appended to `bodies`, the joints of the element itself are returned.
fn parse_contents<R: BufRead>(
    reader: &mut Reader<R>,
    end: &[u8],
    parent: Option<&str>,
    parent_world: &Isometry3<f64>,
    bodies: &mut Vec<RobotBody>,
) -> Result<Vec<RobotJoint>> {
    let mut joints = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"body" => parse_body(reader, e, true, parent, parent_world, bodies)?,
                    b"joint" => {
                        joints.push(parse_joint(e)?);
                        skip_element(reader, &name)?;
                    }
                    _ => skip_element(reader, &name)?,
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"body" => parse_body(reader, e, false, parent, parent_world, bodies)?,
                b"joint" => joints.push(parse_joint(e)?),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == end => break,
            Ok(Event::Eof) => {
                return Err(Error::model(format!(
                    "unexpected end of file in <{}>",
                    String::from_utf8_lossy(end)
                )));
            }
            Ok(_) => {}
            Err(e) => return Err(Error::model(e.to_string())),
        }
        buf.clear();
    }

    Ok(joints)
}

/// Unnamed bodies are not listed, their children attach to the nearest named ancestor.
fn parse_body<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    has_contents: bool,
    parent: Option<&str>,
    parent_world: &Isometry3<f64>,
    bodies: &mut Vec<RobotBody>,
) -> Result<()> {
    let name = attribute(start, "name");
    let local = body_pose(start, name.as_deref())?;
    let world = parent_world * local;

    let index = name.as_ref().map(|name| {
        bodies.push(RobotBody {
            name: name.clone(),
            parent: parent.map(str::to_string),
            local,
            world,
            joints: Vec::new(),
        });
        bodies.len() - 1
    });

    if has_contents {
        let child_parent = name.as_deref().or(parent);
        let joints = parse_contents(reader, b"body", child_parent, &world, bodies)?;
        if let Some(index) = index {
            bodies[index].joints = joints;
        }
    }

    Ok(())
}

fn body_pose(start: &BytesStart, name: Option<&str>) -> Result<Isometry3<f64>> {
    let context = name.unwrap_or("<unnamed>");

    for unsupported in ["euler", "axisangle", "xyaxes", "zaxis"] {
        if attribute(start, unsupported).is_some() {
            return Err(Error::model(format!(
                "body `{context}` uses `{unsupported}`, only `quat` orientations are supported"
            )));
        }
    }

    let translation = match attribute(start, "pos") {
        Some(pos) => {
            let [x, y, z] = parse_floats(&pos, context)?;
            Translation3::new(x, y, z)
        }
        None => Translation3::identity(),
    };

    let rotation = match attribute(start, "quat") {
        Some(quat) => {
            let [w, x, y, z] = parse_floats(&quat, context)?;
            UnitQuaternion::try_new(Quaternion::new(w, x, y, z), 1e-9).ok_or_else(|| {
                Error::model(format!(
                    "body `{context}` has a quaternion that cannot be normalized: `{quat}`"
                ))
            })?
        }
        None => UnitQuaternion::identity(),
    };

    Ok(Isometry3::from_parts(translation, rotation))
}

fn parse_joint(start: &BytesStart) -> Result<RobotJoint> {
    let name = attribute(start, "name");
    let context = name.as_deref().unwrap_or("<unnamed>");

    let axis = match attribute(start, "axis") {
        Some(axis) => Vector3::from(parse_floats::<3>(&axis, context)?),
        None => Vector3::z(),
    };
    let range = attribute(start, "range")
        .map(|range| parse_floats::<2>(&range, context).map(|[low, high]| (low, high)))
        .transpose()?;

    Ok(RobotJoint {
        kind: attribute(start, "type").unwrap_or_else(|| "hinge".to_string()),
        name,
        axis,
        range,
    })
}

fn parse_floats<const N: usize>(value: &str, context: &str) -> Result<[f64; N]> {
    let invalid = || Error::model(format!("`{context}`: expected {N} numbers, got `{value}`"));

    let mut numbers = [0.0; N];
    let mut parts = value.split_whitespace();
    for number in &mut numbers {
        *number = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(invalid)?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(numbers)
}

fn attribute(start: &BytesStart, name: &str) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name.as_bytes())
        .and_then(|attr| String::from_utf8(attr.value.to_vec()).ok())
}

fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == name => depth += 1,
            Ok(Event::End(ref e)) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::model(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const MODEL: &str = r#"
        <mujoco model="dash_mini">
          <compiler angle="radian"/>
          <default>
            <joint damping="0.1"/>
          </default>
          <worldbody>
            <light pos="0 0 3"/>
            <geom name="floor" type="plane" size="5 5 0.1"/>
            <body name="torso" pos="0 0 1.1">
              <freejoint/>
              <geom type="box" size="0.1 0.15 0.2"/>
              <site name="imu" pos="0 0 0.1"/>
              <body name="head" pos="0 0 0.45"/>
              <body name="r_hip" pos="0 -0.1 -0.1">
                <joint name="r_hip_yaw" range="-0.5 0.5"/>
                <body name="r_upper_leg" pos="0 0 -0.3">
                  <joint name="r_knee" axis="0 1 0" range="0 2.4"/>
                  <body name="r_foot" pos="0 0 -0.5"/>
                </body>
              </body>
              <body pos="0 0.1 -0.1" quat="0 0 0 1">
                <body name="l_foot" pos="0 0 -0.92">
                  <joint type="ball"/>
                </body>
              </body>
            </body>
          </worldbody>
          <actuator>
            <motor joint="r_knee" gear="50"/>
          </actuator>
        </mujoco>
    "#;

    #[test]
    fn body_tree() {
        let model = RobotModel::from_xml_str(MODEL).unwrap();

        assert_eq!(model.name.as_deref(), Some("dash_mini"));
        assert_eq!(
            model.body_names().collect::<Vec<_>>(),
            vec!["torso", "head", "r_hip", "r_upper_leg", "r_foot", "l_foot"]
        );
        assert_eq!(model.body("torso").unwrap().parent, None);
        assert_eq!(model.body("r_foot").unwrap().parent.as_deref(), Some("r_upper_leg"));
        // the unnamed wrapper is transparent
        assert_eq!(model.body("l_foot").unwrap().parent.as_deref(), Some("torso"));
    }

    #[test]
    fn world_poses_follow_the_tree() {
        let model = RobotModel::from_xml_str(MODEL).unwrap();

        let r_foot = model.body("r_foot").unwrap().world.translation.vector;
        assert_relative_eq!(r_foot, Vector3::new(0.0, -0.1, 0.2), epsilon = 1e-12);

        // rotated half a turn about z, so the wrapper's children keep their height
        let l_foot = model.body("l_foot").unwrap().world.translation.vector;
        assert_relative_eq!(l_foot, Vector3::new(0.0, 0.1, 0.08), epsilon = 1e-12);
    }

    #[test]
    fn joints() {
        let model = RobotModel::from_xml_str(MODEL).unwrap();

        let hip = &model.body("r_hip").unwrap().joints;
        assert_eq!(hip.len(), 1);
        assert_eq!(hip[0].name.as_deref(), Some("r_hip_yaw"));
        assert_eq!(hip[0].kind, "hinge");
        assert_eq!(hip[0].axis, Vector3::z());
        assert_eq!(hip[0].range, Some((-0.5, 0.5)));

        let knee = &model.body("r_upper_leg").unwrap().joints[0];
        assert_eq!(knee.axis, Vector3::y());

        let ankle = &model.body("l_foot").unwrap().joints[0];
        assert_eq!(ankle.name, None);
        assert_eq!(ankle.kind, "ball");
        assert_eq!(ankle.range, None);

        // <freejoint/> is not a <joint>
        assert!(model.body("torso").unwrap().joints.is_empty());
    }

    #[test]
    fn height_from_lowest_foot() {
        let model = RobotModel::from_xml_str(MODEL).unwrap();
        // head at 1.55, left foot at 0.08
        assert_relative_eq!(model.estimate_height().unwrap(), 1.47, epsilon = 1e-12);

        let footless = RobotModel::from_xml_str(
            r#"<mujoco><worldbody><body name="torso" pos="0 0 1"/></worldbody></mujoco>"#,
        )
        .unwrap();
        assert_eq!(footless.estimate_height(), None);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dash.xml");
        fs::write(&path, MODEL).unwrap();

        let model = RobotModel::load(&path).unwrap();
        assert_eq!(model.bodies.len(), 6);

        assert!(matches!(
            RobotModel::load(dir.path().join("missing.xml")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn malformed_models() {
        let cases = [
            (r"<robot name='dash'/>", "no <mujoco> element"),
            (
                r#"<mujoco><worldbody><body name="torso" pos="0 1"/></worldbody></mujoco>"#,
                "`torso`: expected 3 numbers, got `0 1`",
            ),
            (
                r#"<mujoco><worldbody><body name="torso" quat="0 0 0 0"/></worldbody></mujoco>"#,
                "cannot be normalized",
            ),
            (
                r#"<mujoco><worldbody><body name="torso" euler="0 0 1"/></worldbody></mujoco>"#,
                "only `quat` orientations are supported",
            ),
        ];

        for (xml, expected) in cases {
            let error = RobotModel::from_xml_str(xml).unwrap_err();
            assert!(matches!(error, Error::Model { .. }), "{xml}: {error:?}");
            assert!(error.to_string().contains(expected), "{xml}: {error}");
        }

        let truncated = r#"<mujoco><worldbody><body name="torso">"#;
        assert!(matches!(
            RobotModel::from_xml_str(truncated),
            Err(Error::Model { .. })
        ));
    }
}
