//! BvhSink - Biovision hierarchy export
//!
//! Joint offsets come from the first baked frame. Roots carry position and
//! rotation channels, every other joint rotation only. Rotations are written
//! as intrinsic Z-Y-X Euler angles in degrees.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use contracts::{
    quat_to_euler_zyx_degrees, AssetHandle, AssetSink, BakedAnimation, ContractError,
};
use nalgebra::Vector3;
use tracing::{debug, error, instrument};

use super::file::{asset_file, namespace_dir};

/// Configuration for BvhSink
#[derive(Debug, Clone)]
pub struct BvhSinkConfig {
    pub base_path: PathBuf,
    /// Digits after the decimal point
    pub precision: usize,
}

impl BvhSinkConfig {
    /// Create config from params map (`base_path`, `precision`)
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let precision = params
            .get("precision")
            .and_then(|p| p.parse().ok())
            .unwrap_or(6);
        Self {
            base_path,
            precision,
        }
    }
}

/// Sink that writes `.bvh` files
pub struct BvhSink {
    name: String,
    config: BvhSinkConfig,
    created_dirs: HashSet<PathBuf>,
}

impl BvhSink {
    pub fn new(name: impl Into<String>, config: BvhSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;
        Ok(Self {
            name: name.into(),
            config,
            created_dirs: HashSet::new(),
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, BvhSinkConfig::from_params(params))
    }

    fn write_asset(&mut self, asset: &BakedAnimation) -> std::io::Result<PathBuf> {
        let dir = namespace_dir(&self.config.base_path, &asset.asset_path);
        if !self.created_dirs.contains(&dir) {
            fs::create_dir_all(&dir)?;
            self.created_dirs.insert(dir.clone());
        }
        let path = asset_file(&dir, &asset.name, "bvh");
        let mut writer = BufWriter::new(File::create(&path)?);
        write_bvh(&mut writer, asset, self.config.precision)?;
        writer.flush()?;
        Ok(path)
    }
}

/// Joints in hierarchy (depth-first) order; channel columns follow this order
fn joint_order(asset: &BakedAnimation) -> Vec<usize> {
    let skeleton = &asset.skeleton;
    let mut order = Vec::with_capacity(skeleton.bone_count());
    let mut stack: Vec<usize> = (0..skeleton.bone_count())
        .filter(|&b| skeleton.parent(b).is_none())
        .rev()
        .collect();
    while let Some(bone) = stack.pop() {
        order.push(bone);
        let children: Vec<usize> = skeleton.children(bone).collect();
        stack.extend(children.into_iter().rev());
    }
    order
}

fn first_position(asset: &BakedAnimation, bone: usize) -> Vector3<f64> {
    asset
        .tracks
        .get(bone)
        .and_then(|t| t.positions.first())
        .copied()
        .unwrap_or_else(Vector3::zeros)
}

fn write_joint<W: Write>(
    out: &mut W,
    asset: &BakedAnimation,
    bone: usize,
    depth: usize,
    p: usize,
) -> std::io::Result<()> {
    let skeleton = &asset.skeleton;
    let indent = "  ".repeat(depth);
    let name = skeleton.bone_name(bone).unwrap_or("bone");
    let is_root = skeleton.parent(bone).is_none();

    if is_root {
        writeln!(out, "{indent}ROOT {name}")?;
    } else {
        writeln!(out, "{indent}JOINT {name}")?;
    }
    writeln!(out, "{indent}{{")?;

    let offset = if is_root {
        Vector3::zeros()
    } else {
        first_position(asset, bone)
    };
    writeln!(
        out,
        "{indent}  OFFSET {:.p$} {:.p$} {:.p$}",
        offset.x, offset.y, offset.z
    )?;
    if is_root {
        writeln!(
            out,
            "{indent}  CHANNELS 6 Xposition Yposition Zposition Zrotation Yrotation Xrotation"
        )?;
    } else {
        writeln!(out, "{indent}  CHANNELS 3 Zrotation Yrotation Xrotation")?;
    }

    let children: Vec<usize> = skeleton.children(bone).collect();
    if children.is_empty() {
        writeln!(out, "{indent}  End Site")?;
        writeln!(out, "{indent}  {{")?;
        writeln!(out, "{indent}    OFFSET 0 0 0")?;
        writeln!(out, "{indent}  }}")?;
    }
    for child in children {
        write_joint(out, asset, child, depth + 1, p)?;
    }
    writeln!(out, "{indent}}}")
}

/// Render the full BVH document
pub fn write_bvh<W: Write>(out: &mut W, asset: &BakedAnimation, p: usize) -> std::io::Result<()> {
    let order = joint_order(asset);
    let skeleton = &asset.skeleton;

    writeln!(out, "HIERARCHY")?;
    for &root in order.iter().filter(|&&b| skeleton.parent(b).is_none()) {
        write_joint(out, asset, root, 0, p)?;
    }

    let fps = asset.frame_rate.max(1);
    writeln!(out, "MOTION")?;
    writeln!(out, "Frames: {}", asset.frame_count)?;
    writeln!(out, "Frame Time: {:.p$}", 1.0 / fps as f64)?;

    for frame in 0..asset.frame_count {
        let mut values: Vec<f64> = Vec::with_capacity(order.len() * 3 + 3);
        for &bone in &order {
            let Some(track) = asset.tracks.get(bone) else {
                continue;
            };
            if skeleton.parent(bone).is_none() {
                let pos = track.positions.get(frame).copied().unwrap_or_else(Vector3::zeros);
                values.extend([pos.x, pos.y, pos.z]);
            }
            let euler = track
                .rotations
                .get(frame)
                .map(quat_to_euler_zyx_degrees)
                .unwrap_or([0.0; 3]);
            values.extend(euler);
        }
        let line: Vec<String> = values.iter().map(|v| format!("{v:.p$}")).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}

impl AssetSink for BvhSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "bvh_sink_commit",
        skip(self, asset),
        fields(sink = %self.name, asset = %asset.name)
    )]
    async fn commit(&mut self, asset: &BakedAnimation) -> Result<AssetHandle, ContractError> {
        let path = self.write_asset(asset).map_err(|e| {
            error!(sink = %self.name, asset = %asset.name, error = %e, "write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })?;
        debug!(path = %path.display(), "bvh written");
        Ok(AssetHandle {
            sink: self.name.clone(),
            location: path.display().to_string(),
        })
    }

    #[instrument(name = "bvh_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
