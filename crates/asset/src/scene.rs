//! Owned, index-based copy of an imported scene graph.
//!
//! Front-ends (`obj`, `gltf_import`) copy everything the renderer needs out of the
//! third-party parser in a single pass; nothing here borrows from it.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::material::MaterialRecord;
use crate::mesh::MeshData;
use crate::postprocess::PostProcess;
use crate::slots::SceneFormat;

/// Structural failures that abort an import.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene file not found: {0}")]
    NotFound(PathBuf),
    #[error("unsupported scene format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("failed to parse OBJ {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("failed to parse glTF {path}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("incomplete scene: {0}")]
    Incomplete(String),
    #[error("scene has no root node")]
    NoRoot,
}

/// Node of the scene tree; meshes and children are indices into [`SceneData`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneNode {
    pub name: String,
    pub meshes: Vec<usize>,
    pub children: Vec<usize>,
}

/// Compressed image stored inside the scene file, referenced as `*N`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedTexture {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl EmbeddedTexture {
    /// Reference string used by materials for the embedded image at `index`.
    pub fn reference(index: usize) -> String {
        format!("*{index}")
    }
}

/// Parses an embedded reference (`*3`) into its index.
pub fn embedded_index(reference: &str) -> Option<usize> {
    reference.strip_prefix('*')?.parse().ok()
}

#[derive(Clone, Debug)]
pub struct SceneData {
    pub format: SceneFormat,
    /// Directory relative texture references are resolved against.
    pub directory: PathBuf,
    /// Node arena; `root` indexes into it.
    pub nodes: Vec<SceneNode>,
    pub root: Option<usize>,
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialRecord>,
    pub embedded: Vec<EmbeddedTexture>,
}

impl SceneData {
    pub fn new(format: SceneFormat, directory: impl Into<PathBuf>) -> Self {
        Self {
            format,
            directory: directory.into(),
            nodes: Vec::new(),
            root: None,
            meshes: Vec::new(),
            materials: Vec::new(),
            embedded: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: SceneNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn root_node(&self) -> Option<&SceneNode> {
        self.root.and_then(|r| self.nodes.get(r))
    }

    /// Store an embedded image and return its `*N` reference.
    pub fn push_embedded(&mut self, texture: EmbeddedTexture) -> String {
        self.embedded.push(texture);
        EmbeddedTexture::reference(self.embedded.len() - 1)
    }

    pub fn embedded_texture(&self, reference: &str) -> Option<&EmbeddedTexture> {
        embedded_index(reference).and_then(|i| self.embedded.get(i))
    }

    /// Node indices in pre-order: a node before its children, children in order.
    /// Each node is visited at most once, even if the graph is not a tree.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(idx) = stack.pop() {
            let Some(node) = self.nodes.get(idx) else {
                continue;
            };
            if std::mem::replace(&mut visited[idx], true) {
                continue;
            }
            order.push(idx);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    /// Mesh indices in draw order (pre-order over nodes).
    pub fn mesh_order(&self) -> Vec<usize> {
        self.preorder()
            .into_iter()
            .flat_map(|n| self.nodes[n].meshes.iter().copied())
            .collect()
    }

    /// Reject graphs with no root, no meshes or dangling indices.
    pub fn check(&self) -> Result<(), SceneError> {
        let root = self.root.ok_or(SceneError::NoRoot)?;
        if root >= self.nodes.len() {
            return Err(SceneError::NoRoot);
        }
        if self.meshes.is_empty() {
            return Err(SceneError::Incomplete("scene contains no meshes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(&m) = node.meshes.iter().find(|&&m| m >= self.meshes.len()) {
                return Err(SceneError::Incomplete(format!(
                    "node {i} references missing mesh {m}"
                )));
            }
            if let Some(&c) = node.children.iter().find(|&&c| c >= self.nodes.len()) {
                return Err(SceneError::Incomplete(format!(
                    "node {i} references missing child {c}"
                )));
            }
        }
        for (i, mesh) in self.meshes.iter().enumerate() {
            if mesh.material >= self.materials.len() {
                return Err(SceneError::Incomplete(format!(
                    "mesh {i} references missing material {}",
                    mesh.material
                )));
            }
        }
        Ok(())
    }

    /// Post-process every mesh that passes validation; invalid meshes are left
    /// as-is for the consumer to report.
    pub fn post_process(&mut self, steps: &PostProcess) {
        for mesh in &mut self.meshes {
            if mesh.validate().is_ok() {
                steps.apply(mesh);
            }
        }
    }
}

/// Load a scene file, picking the front-end from the extension, and run the
/// post-processing pipeline.
pub fn load_scene(path: impl AsRef<Path>, steps: &PostProcess) -> Result<SceneData, SceneError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(SceneError::NotFound(path.to_path_buf()));
    }
    let format = SceneFormat::from_path(path)
        .ok_or_else(|| SceneError::UnsupportedFormat(path.to_path_buf()))?;

    log::info!("Importing {:?} scene from {}", format, path.display());
    let mut scene = match format {
        SceneFormat::Obj => crate::obj::load_obj_scene(path)?,
        SceneFormat::Gltf => crate::gltf_import::load_gltf_scene(path)?,
    };
    scene.check()?;
    scene.post_process(steps);

    log::info!(
        "Parsed {} nodes, {} meshes, {} materials, {} embedded textures",
        scene.nodes.len(),
        scene.meshes.len(),
        scene.materials.len(),
        scene.embedded.len()
    );
    Ok(scene)
}

/// Directory containing `path`; relative texture references resolve against it.
pub fn base_directory(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
