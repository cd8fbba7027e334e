use scene::reconcile::ElementSet;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

/// Group of retained elements drawn together (an SVG `<g>`).
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub class: String,
    pub elements: ElementSet,
    /// Uniform scale applied on responsive resize.
    pub scale: f64,
}

impl Layer {
    pub fn new(id: LayerId, class: impl Into<String>) -> Self {
        Self {
            id,
            class: class.into(),
            elements: ElementSet::new(),
            scale: 1.0,
        }
    }
}

/// Where a new layer goes in paint order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LayerPosition {
    /// Painted first, below everything.
    Bottom,
    /// Painted last, above everything.
    Top,
    /// Directly below the given layer.
    Below(LayerId),
}

/// Layers in paint order (first painted first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerStack {
    layers: Vec<Layer>,
    next_id: u64,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, class: impl Into<String>, position: LayerPosition) -> LayerId {
        self.next_id += 1;
        let id = LayerId(self.next_id);
        let mut layer = Layer::new(id, class);
        if let Some(scale) = self.layers.first().map(|l| l.scale) {
            layer.scale = scale;
        }
        match position {
            LayerPosition::Bottom => self.layers.insert(0, layer),
            LayerPosition::Top => self.layers.push(layer),
            LayerPosition::Below(other) => match self.position(other) {
                Some(i) => self.layers.insert(i, layer),
                None => self.layers.push(layer),
            },
        }
        id
    }

    fn position(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Drops a layer and its elements.
    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        let i = self.position(id)?;
        Some(self.layers.remove(i))
    }

    pub fn find_by_class(&self, class: &str) -> Option<LayerId> {
        self.layers.iter().find(|l| l.class == class).map(|l| l.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.layers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn set_scale(&mut self, scale: f64) {
        for layer in &mut self.layers {
            layer.scale = scale;
        }
    }
}
