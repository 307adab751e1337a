//! An in-memory `TalusApi` for tests.

use std::{
    collections::{HashMap, VecDeque},
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use crate::{
    client::TalusApi,
    error::ApiError,
    models::{Image, ImageStatus, Os, Reference, Search, Timestamps},
};

static CREATED: AtomicU64 = AtomicU64::new(1_400_000_000);

/// A saved image; each call is created one second after the previous one.
pub fn image(id: &str, name: &str, base: Option<&str>) -> Image {
    Image {
        id: Some(id.to_string()),
        name: name.to_string(),
        base_image: base.map(Reference::from),
        status: ImageStatus::new("ready"),
        timestamps: Timestamps {
            created: Some(CREATED.fetch_add(1, Ordering::SeqCst) as f64),
            modified: None,
        },
        ..Default::default()
    }
}

/// What the next lookup of a saved image returns.
#[derive(Debug, Clone)]
pub enum Step {
    Status(ImageStatus),
    Gone,
}

pub struct FakeApi {
    images: Mutex<Vec<Image>>,
    oses: Vec<Os>,
    saved: Mutex<Vec<Image>>,
    searches: Mutex<Vec<Search>>,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    next_id: AtomicU64,
}

impl FakeApi {
    pub fn new(images: Vec<Image>) -> Self {
        FakeApi {
            images: Mutex::new(images),
            oses: Vec::new(),
            saved: Mutex::new(Vec::new()),
            searches: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_os(mut self, id: &str, name: &str) -> Self {
        self.oses.push(Os {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        });
        self
    }

    /// Script the states a saved image goes through on later lookups by id.
    pub fn script(&self, id: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), steps.into_iter().collect());
    }

    /// Every image passed to `save_image`, in order.
    pub fn saved(&self) -> Vec<Image> {
        self.saved.lock().unwrap().clone()
    }

    /// Every search passed to `list_images`, in order.
    pub fn searches(&self) -> Vec<Search> {
        self.searches.lock().unwrap().clone()
    }

    pub fn stored(&self, id: &str) -> Option<Image> {
        self.images.lock().unwrap().iter().find(|i| i.id() == id).cloned()
    }

    fn was_saved(&self, id: &str) -> bool {
        self.saved.lock().unwrap().iter().any(|i| i.id() == id)
    }

    fn next_step(&self, id: &str) -> Option<Step> {
        if !self.was_saved(id) {
            return None;
        }

        self.scripts.lock().unwrap().get_mut(id)?.pop_front()
    }
}

fn matches(image: &Image, key: &str, value: &str) -> bool {
    match key {
        "id" => image.id() == value,
        "name" => image.name == value,
        "base_image" if value == "null" => image.base_image.is_none(),
        "base_image" => image.base_image_id() == Some(value),
        "tags" => image.tags.iter().any(|t| t == value),
        "status.name" => image.status.name == value,
        _ => true,
    }
}

#[async_trait::async_trait]
impl TalusApi for FakeApi {
    async fn list_images(&self, search: &Search) -> Result<Vec<Image>, ApiError> {
        self.searches.lock().unwrap().push(search.clone());

        if let Some(id) = search.get("id").first() {
            match self.next_step(id) {
                Some(Step::Gone) => {
                    self.images.lock().unwrap().retain(|i| i.id() != *id);
                    return Ok(Vec::new());
                }
                Some(Step::Status(status)) => {
                    let mut images = self.images.lock().unwrap();
                    if let Some(image) = images.iter_mut().find(|i| i.id() == *id) {
                        image.status = status;
                    }
                }
                None => {}
            }
        }

        let mut found: Vec<Image> = self
            .images
            .lock()
            .unwrap()
            .iter()
            .filter(|i| {
                search
                    .pairs()
                    .iter()
                    .all(|(k, v)| matches(i, k, v))
            })
            .cloned()
            .collect();

        let created = |i: &Image| i.timestamps.created.unwrap_or_default();
        match search.get("sort").first() {
            Some(&"-timestamps.created") => found.sort_by(|a, b| created(b).total_cmp(&created(a))),
            Some(&"timestamps.created") => found.sort_by(|a, b| created(a).total_cmp(&created(b))),
            _ => {}
        }

        let skip = search.get("skip").first().and_then(|s| s.parse().ok()).unwrap_or(0);
        let num = search.get("num").first().and_then(|s| s.parse().ok()).unwrap_or(usize::MAX);

        Ok(found.into_iter().skip(skip).take(num).collect())
    }

    async fn save_image(&self, image: &mut Image) -> Result<(), ApiError> {
        if image.id.is_none() {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            image.id = Some(format!("new{}", n));
        }

        let mut images = self.images.lock().unwrap();
        match images.iter_mut().find(|i| i.id == image.id) {
            Some(existing) => *existing = image.clone(),
            None => images.push(image.clone()),
        }

        self.saved.lock().unwrap().push(image.clone());

        Ok(())
    }

    async fn list_oses(&self, search: &Search) -> Result<Vec<Os>, ApiError> {
        Ok(self
            .oses
            .iter()
            .filter(|os| {
                search.pairs().iter().all(|(k, v)| match k.as_str() {
                    "id" => &os.id == v,
                    "name" => &os.name == v,
                    _ => true,
                })
            })
            .cloned()
            .collect())
    }

    async fn upload_file(&self, path: &Path) -> Result<String, ApiError> {
        Ok(format!("upload-{}", path.display()))
    }
}
