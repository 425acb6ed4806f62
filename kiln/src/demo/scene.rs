//! The demo build target.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Group,
    Mesh,
    Light,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub parent: Option<String>,
    pub vertices: usize,
}

impl SceneObject {
    pub fn new(name: &str, kind: ObjectKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            parent: None,
            vertices: 0,
        }
    }

    pub fn under(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn vertices(mut self, vertices: usize) -> Self {
        self.vertices = vertices;
        self
    }
}

/// A flat list of objects linked by parent name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
}

impl Scene {
    /// The scene the `kiln` commands build.
    pub fn sample() -> Self {
        Self {
            objects: vec![
                SceneObject::new(" Root ", ObjectKind::Group),
                SceneObject::new("Props", ObjectKind::Group).under(" Root "),
                SceneObject::new("Crate", ObjectKind::Mesh).under("Props").vertices(24),
                SceneObject::new("Barrel", ObjectKind::Mesh).under("Props").vertices(96),
                SceneObject::new("Empty", ObjectKind::Group).under(" Root "),
                SceneObject::new("Placeholder", ObjectKind::Mesh).under("Empty"),
                SceneObject::new("Sun", ObjectKind::Light).under(" Root "),
            ],
        }
    }

    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SceneObject> + 'a {
        self.objects
            .iter()
            .filter(move |object| object.parent.as_deref() == Some(name))
    }
}
