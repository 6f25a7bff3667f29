use super::{extras_for, ExportOptions, GlbError, GlbExporter, GlbImporter, Result};
use crate::geometry::{Material, Mesh};
use crate::scene::{EmptyDisplay, NodeRole, ObjectId, ObjectKind, SceneState, Transform};
use glam::{EulerRot, Mat4, Quat};
use gltf::json;
use json::validation::Checked::Valid;
use json::validation::USize64;
use serde_json::value::RawValue;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Imports GLB blobs with the `gltf` crate. Only triangle primitives and
/// embedded buffers are read.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfImporter;

impl GlbImporter for GltfImporter {
    fn import(&mut self, scene: &mut SceneState, bytes: &[u8]) -> Result<Vec<ObjectId>> {
        let gltf = gltf::Gltf::from_slice(bytes)?;
        let blob = gltf.blob.as_deref();
        let buffers = gltf
            .buffers()
            .map(|buffer| match buffer.source() {
                gltf::buffer::Source::Bin => blob.ok_or(GlbError::ExternalBuffer(buffer.index())),
                gltf::buffer::Source::Uri(_) => Err(GlbError::ExternalBuffer(buffer.index())),
            })
            .collect::<Result<Vec<&[u8]>>>()?;

        let Some(gltf_scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) else {
            log::warn!("GLB contains no scene, nothing imported");
            return Ok(Vec::new());
        };

        let mut created = Vec::new();
        for node in gltf_scene.nodes() {
            import_node(scene, &node, None, &buffers, &mut created)?;
        }
        log::info!("Imported {} object(s) from GLB", created.len());
        Ok(created)
    }
}

fn import_node(
    scene: &mut SceneState,
    node: &gltf::Node,
    parent: Option<ObjectId>,
    buffers: &[&[u8]],
    created: &mut Vec<ObjectId>,
) -> Result<()> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Node{}", node.index()));
    let kind = match node.mesh() {
        Some(mesh) => ObjectKind::Mesh(read_mesh(&mesh, &name, buffers)),
        None => ObjectKind::Empty(EmptyDisplay::axes(1.0)),
    };

    let (translation, rotation, scale) = node.transform().decomposed();
    let (z, y, x) = Quat::from_array(rotation).to_euler(EulerRot::ZYX);
    let role = node
        .extras()
        .as_ref()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw.get()).ok())
        .and_then(|extras| NodeRole::from_extras(&extras));

    let id = scene.add_object(name, kind);
    {
        let object = scene.require_mut(id)?;
        object.transform = Transform {
            position: translation,
            rotation_deg: [x.to_degrees(), y.to_degrees(), z.to_degrees()],
            scale,
        };
        object.role = role;
    }
    scene.set_parent(id, parent)?;
    created.push(id);

    for child in node.children() {
        import_node(scene, &child, Some(id), buffers, created)?;
    }
    Ok(())
}

fn read_mesh(mesh: &gltf::Mesh, name: &str, buffers: &[&[u8]]) -> Mesh {
    let mut out = Mesh::new(name, Vec::new(), Vec::new());
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!("Skipping non-triangle primitive in '{}'", name);
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).copied());
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let base = out.vertices.len() as u32;
        out.vertices.extend(positions);
        let count = out.vertices.len() as u32 - base;
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..count).collect(),
        };
        let before = out.faces.len();
        let triangles = indices.chunks_exact(3);
        let total = triangles.len();
        out.faces.extend(
            triangles
                .filter(|triangle| triangle.iter().all(|&i| i < count))
                .map(|triangle| triangle.iter().map(|i| base + i).collect()),
        );
        let dropped = total - (out.faces.len() - before);
        if dropped > 0 {
            log::warn!(
                "Dropped {} triangle(s) with out-of-range indices in '{}'",
                dropped,
                name
            );
        }

        let material = primitive.material();
        if let Some(material_name) = material.name() {
            if !out.materials.iter().any(|m| m.name == material_name) {
                out.materials.push(Material {
                    name: material_name.to_string(),
                    base_color: material.pbr_metallic_roughness().base_color_factor(),
                });
            }
        }
    }
    out
}

/// Writes GLB files with the `gltf` JSON model.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfExporter;

impl GlbExporter for GltfExporter {
    fn export(
        &mut self,
        scene: &SceneState,
        objects: &[ObjectId],
        path: &Path,
        options: &ExportOptions,
    ) -> Result<()> {
        let bytes = encode_glb(scene, objects, options)?;
        std::fs::write(path, bytes)?;
        log::debug!("Wrote {} object(s) to {}", objects.len(), path.display());
        Ok(())
    }
}

fn push_bytes(bin: &mut Vec<u8>, data: impl IntoIterator<Item = [u8; 4]>) -> (usize, usize) {
    let offset = bin.len();
    for chunk in data {
        bin.extend_from_slice(&chunk);
    }
    (offset, bin.len() - offset)
}

fn push_view(
    root: &mut json::Root,
    offset: usize,
    length: usize,
    target: json::buffer::Target,
) -> json::Index<json::buffer::View> {
    root.push(json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64::from(length),
        byte_offset: Some(USize64::from(offset)),
        byte_stride: None,
        target: Some(Valid(target)),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn encode_mesh(
    root: &mut json::Root,
    bin: &mut Vec<u8>,
    mesh: &Mesh,
) -> Option<json::Index<json::Mesh>> {
    let (min, max) = mesh.bounds()?;
    // Polygons are fanned into triangles.
    let indices: Vec<u32> = mesh
        .faces
        .iter()
        .filter(|face| face.len() >= 3)
        .flat_map(|face| (1..face.len() - 1).flat_map(move |i| [face[0], face[i], face[i + 1]]))
        .collect();
    if indices.is_empty() {
        return None;
    }

    let (offset, length) = push_bytes(
        bin,
        mesh.vertices
            .iter()
            .flat_map(|vertex| vertex.map(f32::to_le_bytes)),
    );
    let positions_view = push_view(root, offset, length, json::buffer::Target::ArrayBuffer);
    let positions = root.push(json::Accessor {
        buffer_view: Some(positions_view),
        byte_offset: Some(USize64(0)),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::F32,
        )),
        count: USize64::from(mesh.vertices.len()),
        extensions: Default::default(),
        extras: Default::default(),
        max: Some(serde_json::json!(max.to_array())),
        min: Some(serde_json::json!(min.to_array())),
        name: None,
        normalized: false,
        sparse: None,
        type_: Valid(json::accessor::Type::Vec3),
    });

    let (offset, length) = push_bytes(bin, indices.iter().map(|i| i.to_le_bytes()));
    let indices_view = push_view(root, offset, length, json::buffer::Target::ElementArrayBuffer);
    let indices_accessor = root.push(json::Accessor {
        buffer_view: Some(indices_view),
        byte_offset: Some(USize64(0)),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::U32,
        )),
        count: USize64::from(indices.len()),
        extensions: Default::default(),
        extras: Default::default(),
        max: None,
        min: None,
        name: None,
        normalized: false,
        sparse: None,
        type_: Valid(json::accessor::Type::Scalar),
    });

    let material = mesh.materials.first().map(|material| {
        root.push(json::Material {
            name: Some(material.name.clone()),
            pbr_metallic_roughness: json::material::PbrMetallicRoughness {
                base_color_factor: json::material::PbrBaseColorFactor(material.base_color),
                ..Default::default()
            },
            ..Default::default()
        })
    });

    Some(root.push(json::Mesh {
        name: Some(mesh.name.clone()),
        primitives: vec![json::mesh::Primitive {
            attributes: BTreeMap::from([(Valid(json::mesh::Semantic::Positions), positions)]),
            indices: Some(indices_accessor),
            material,
            mode: Valid(json::mesh::Mode::Triangles),
            targets: None,
            extensions: Default::default(),
            extras: Default::default(),
        }],
        weights: None,
        extensions: Default::default(),
        extras: Default::default(),
    }))
}

/// Encodes `objects` as one GLB. Objects whose parent is not exported
/// become scene roots.
pub fn encode_glb(
    scene: &SceneState,
    objects: &[ObjectId],
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let mut root = json::Root::default();
    root.asset = json::Asset {
        version: "2.0".to_string(),
        generator: Some(concat!("hyptools ", env!("CARGO_PKG_VERSION")).to_string()),
        ..Default::default()
    };

    let exported: Vec<ObjectId> = objects
        .iter()
        .copied()
        .filter(|id| scene.contains(*id))
        .collect();
    let node_index: HashMap<ObjectId, u32> = exported
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index as u32))
        .collect();

    let mut bin = Vec::new();
    let mut nodes = Vec::with_capacity(exported.len());
    let mut scene_roots = Vec::new();
    for &id in &exported {
        let object = scene.require(id)?;
        let is_root = object
            .parent
            .map_or(true, |parent| !node_index.contains_key(&parent));

        let transform = if is_root && options.apply_transforms {
            Transform::from_matrix(scene.world_matrix(id).unwrap_or(Mat4::IDENTITY))
        } else {
            object.transform
        };
        let [x, y, z] = transform.rotation_deg.map(f32::to_radians);
        let rotation = Quat::from_euler(EulerRot::ZYX, z, y, x);

        let mesh = match &object.kind {
            ObjectKind::Mesh(mesh) => encode_mesh(&mut root, &mut bin, mesh),
            _ => None,
        };
        let children: Vec<json::Index<json::Node>> = scene
            .children(id)
            .iter()
            .filter_map(|child| node_index.get(child))
            .map(|index| json::Index::new(*index))
            .collect();
        let extras = match extras_for(scene, id).filter(|_| options.include_extras) {
            Some(map) => Some(RawValue::from_string(serde_json::to_string(&map)?)?),
            None => None,
        };

        nodes.push(json::Node {
            name: Some(object.name.clone()),
            mesh,
            children: (!children.is_empty()).then_some(children),
            translation: Some(transform.position),
            rotation: Some(json::scene::UnitQuaternion(rotation.to_array())),
            scale: Some(transform.scale),
            extras,
            ..Default::default()
        });
        if is_root {
            scene_roots.push(json::Index::new(node_index[&id]));
        }
    }

    for node in nodes {
        root.push(node);
    }
    if !bin.is_empty() {
        root.push(json::Buffer {
            byte_length: USize64::from(bin.len()),
            uri: None,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
    }
    let gltf_scene = root.push(json::Scene {
        nodes: scene_roots,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.scene = Some(gltf_scene);

    let json_string = json::serialize::to_string(&root)?;
    let glb = gltf::binary::Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: 0,
        },
        json: Cow::Owned(json_string.into_bytes()),
        bin: (!bin.is_empty()).then_some(Cow::Owned(bin)),
    };
    let mut bytes = Vec::new();
    glb.to_writer(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use crate::scene::{MeshNode, PhysicsType, RigidbodyNode};
    use glam::Vec3;

    fn tagged_scene() -> (SceneState, Vec<ObjectId>) {
        let mut scene = SceneState::new();
        let root = scene.add_empty("Rock", EmptyDisplay::axes(1.0));
        {
            let object = scene.get_mut(root).unwrap();
            object.role = Some(NodeRole::Rigidbody(RigidbodyNode {
                mass: 2.5,
                body_type: PhysicsType::Kinematic,
            }));
            object.transform.position = [1.0, 2.0, 3.0];
            object.transform.rotation_deg = [0.0, 0.0, 90.0];
        }
        let mesh = scene.add_mesh("RockMeshLOD0", primitives::marker("RockMeshLOD0"));
        scene.get_mut(mesh).unwrap().role = Some(NodeRole::Mesh(MeshNode {
            cast_shadow: true,
            receive_shadow: false,
            max_distance: 25.0,
        }));
        scene.set_parent(mesh, Some(root)).unwrap();
        (scene, vec![root, mesh])
    }

    #[test]
    fn test_exported_glb_reimports_with_roles() {
        let (scene, objects) = tagged_scene();
        let bytes = encode_glb(&scene, &objects, &ExportOptions::default()).unwrap();
        assert_eq!(&bytes[0..4], b"glTF");

        let mut imported = SceneState::new();
        let created = GltfImporter.import(&mut imported, &bytes).unwrap();
        assert_eq!(created.len(), 2);

        let root = imported.get(created[0]).unwrap();
        assert_eq!(root.name, "Rock");
        assert_eq!(root.role, scene.get(objects[0]).unwrap().role);
        assert_eq!(root.transform.position, [1.0, 2.0, 3.0]);
        assert!((root.transform.rotation_deg[2] - 90.0).abs() < 1e-3);

        let child = imported.get(created[1]).unwrap();
        assert_eq!(child.parent, Some(created[0]));
        assert_eq!(child.role, scene.get(objects[1]).unwrap().role);
        let mesh = child.mesh().unwrap();
        // Octahedron: 6 vertices, 8 triangles.
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.faces.len(), 8);
        assert_eq!(mesh.materials[0].name, "Frozen_RockMeshLOD0");
    }

    #[test]
    fn test_extras_omitted_when_disabled() {
        let (scene, objects) = tagged_scene();
        let options = ExportOptions {
            include_extras: false,
            ..ExportOptions::default()
        };
        let bytes = encode_glb(&scene, &objects, &options).unwrap();
        let mut imported = SceneState::new();
        let created = GltfImporter.import(&mut imported, &bytes).unwrap();
        assert!(created.iter().all(|id| imported.get(*id).unwrap().role.is_none()));
    }

    #[test]
    fn test_quads_are_fanned_into_triangles() {
        let mut scene = SceneState::new();
        let cube = scene.add_mesh("Cube", primitives::cube("Cube", 2.0));
        let bytes = encode_glb(&scene, &[cube], &ExportOptions::default()).unwrap();
        let mut imported = SceneState::new();
        let created = GltfImporter.import(&mut imported, &bytes).unwrap();
        let mesh = imported.get(created[0]).unwrap().mesh().unwrap();
        assert_eq!(mesh.faces.len(), 12);
        assert_eq!(mesh.dimensions(), Vec3::splat(2.0));
    }

    #[test]
    fn test_out_of_range_triangles_are_dropped() {
        let mut scene = SceneState::new();
        let mut mesh = primitives::cube("Cube", 2.0);
        mesh.faces.push(vec![0, 1, 99]);
        let cube = scene.add_mesh("Cube", mesh);
        let bytes = encode_glb(&scene, &[cube], &ExportOptions::default()).unwrap();

        let mut imported = SceneState::new();
        let created = GltfImporter.import(&mut imported, &bytes).unwrap();
        let mesh = imported.get(created[0]).unwrap().mesh().unwrap();
        assert_eq!(mesh.faces.len(), 12);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let mut scene = SceneState::new();
        assert!(GltfImporter.import(&mut scene, b"not a glb").is_err());
        assert!(scene.is_empty());
    }
}
