//! Image operations built on top of the remote API.
//!
//! These are the lifecycle requests the service understands: each one is a
//! status change saved on an image record, which the service then acts on.

use std::path::PathBuf;

use crate::{
    client::TalusApi,
    error::ApiError,
    models::{state, Image, ImageStatus, Os, Reference, Search, Timestamps},
};

/// Sent as the checksum of new images; the service fills in the real one.
pub const MD5_PLACEHOLDER: &str = "blahblah";

/// Return the first image matching the search, if any.
pub async fn find_one(api: &dyn TalusApi, search: &Search) -> Result<Option<Image>, ApiError> {
    Ok(api.list_images(search).await?.into_iter().next())
}

/// Look an image up by id, then by name.
pub async fn find_by_id_or_name(api: &dyn TalusApi, id_or_name: &str) -> Result<Option<Image>, ApiError> {
    if let Some(image) = find_one(api, &Search::by("id", id_or_name)).await? {
        return Ok(Some(image));
    }

    find_one(api, &Search::by("name", id_or_name)).await
}

/// Look an OS up by id, then by name.
pub async fn find_os(api: &dyn TalusApi, id_or_name: &str) -> Result<Option<Os>, ApiError> {
    if let Some(os) = api.list_oses(&Search::by("id", id_or_name)).await?.into_iter().next() {
        return Ok(Some(os));
    }

    Ok(api.list_oses(&Search::by("name", id_or_name)).await?.into_iter().next())
}

async fn require_os(api: &dyn TalusApi, id_or_name: &str) -> Result<Os, ApiError> {
    find_os(api, id_or_name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("os with id or name {:?}", id_or_name)))
}

/// Resolve a user supplied image reference.
///
/// A plain value is an id or name. No value, or a git-like `+N`, picks the
/// N-th most recently created image matching `search` (`+1` is the newest).
pub async fn resolve_one(
    api: &dyn TalusApi,
    id_or_name: Option<&str>,
    mut search: Search,
) -> Result<Option<Image>, ApiError> {
    let skip = match id_or_name {
        Some(reference) if !reference.starts_with('+') => return find_by_id_or_name(api, reference).await,
        Some(reference) => parse_relative(reference)?,
        None => 0,
    };

    search.set("skip", &skip.to_string());
    search.set("num", "1");
    search.set("sort", "-timestamps.created");

    find_one(api, &search).await
}

fn parse_relative(reference: &str) -> Result<u64, ApiError> {
    let invalid = || ApiError::validation("Git-like referencing must be a plus sign followed by digits");

    let digits = reference.strip_prefix('+').ok_or_else(invalid)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let n: u64 = digits.parse().map_err(|_| invalid())?;
    Ok(n.saturating_sub(1))
}

/// Like `resolve_one`, but a missing image is an error.
pub async fn require_one(api: &dyn TalusApi, id_or_name: Option<&str>, search: Search) -> Result<Image, ApiError> {
    resolve_one(api, id_or_name, search).await?.ok_or_else(|| {
        ApiError::NotFound(format!("talus image with id or name {:?}", id_or_name.unwrap_or("+1")))
    })
}

/// Re-fetch the image from the service.
///
/// Fails with `NotFound` once the record no longer exists remotely. Images
/// that were never saved are left alone.
pub async fn refresh(api: &dyn TalusApi, image: &mut Image) -> Result<(), ApiError> {
    let id = match &image.id {
        Some(id) => id.to_string(),
        None => return Ok(()),
    };

    match find_one(api, &Search::by("id", &id)).await? {
        Some(update) => {
            *image = update;
            Ok(())
        }
        None => Err(ApiError::NotFound(format!("image {} (the model no longer exists)", id))),
    }
}

/// The images directly based on `image`, in the order the service lists them.
pub async fn children(api: &dyn TalusApi, image: &Image) -> Result<Vec<Image>, ApiError> {
    if image.id.is_none() {
        return Ok(Vec::new());
    }

    api.list_images(&Search::by("base_image", image.id())).await
}

/// Refuse to touch images other images are based on.
pub async fn assert_no_children(api: &dyn TalusApi, image: &Image) -> Result<(), ApiError> {
    if children(api, image).await?.is_empty() {
        return Ok(());
    }

    Err(ApiError::HasDependents(image.name.to_string()))
}

/// Check the fields an image needs before it can be saved.
pub fn validate(image: &Image, require_base: bool) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if image.os.is_none() {
        errors.push("You must specify the os".to_string());
    }

    if image.name.trim().is_empty() {
        errors.push("You must specify a name for the image".to_string());
    }

    if require_base && image.base_image.is_none() {
        errors.push("You must specify the base_image for your new image".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// What to import and how the resulting image should look.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub path: PathBuf,
    pub name: String,
    pub os: String,
    pub desc: String,
    pub tags: Vec<String>,
    /// The id of a file that was already uploaded.
    pub file_id: Option<String>,
    pub username: String,
    pub password: String,
}

/// Upload a disk image and register it as a new root image.
pub async fn import(api: &dyn TalusApi, req: &ImportRequest, user: Option<&str>) -> Result<Image, ApiError> {
    let os = require_os(api, &req.os).await?;

    let uploaded = match &req.file_id {
        Some(file_id) => file_id.to_string(),
        None => {
            log::info!("uploading file {}", req.path.display());
            let file_id = api.upload_file(&req.path).await?;
            log::info!("uploaded file id: {}", file_id);
            file_id
        }
    };

    let mut image = Image {
        name: req.name.to_string(),
        os: Some(Reference::Id(os.id)),
        desc: req.desc.to_string(),
        tags: req.tags.clone(),
        status: ImageStatus::new(state::IMPORT).with("tmpfile", uploaded),
        username: req.username.to_string(),
        password: req.password.to_string(),
        md5: MD5_PLACEHOLDER.to_string(),
        ..Default::default()
    };
    image.timestamps.created = Some(Timestamps::now());
    if let Some(user) = user {
        image.add_tag(user);
    }

    api.save_image(&mut image).await?;

    Ok(image)
}

/// What to base a new image on and what to change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateRequest {
    pub name: String,
    pub base: String,
    pub os: Option<String>,
    pub desc: Option<String>,
    pub tags: Option<Vec<String>>,
    /// The contents of a Vagrantfile to run against the new image.
    pub vagrantfile: Option<String>,
    pub user_interaction: bool,
}

/// Create a new image from an existing one.
///
/// Everything not set in the request is inherited from the base image.
pub async fn create(api: &dyn TalusApi, req: &CreateRequest, user: Option<&str>) -> Result<Image, ApiError> {
    let base = find_by_id_or_name(api, &req.base)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("base image with id or name {:?}", req.base)))?;
    let base_id = base.id().to_string();

    let mut image = Image {
        id: None,
        name: req.name.to_string(),
        base_image: Some(Reference::Id(base_id)),
        timestamps: Timestamps {
            created: Some(Timestamps::now()),
            modified: None,
        },
        ..base
    };

    if let Some(os) = &req.os {
        image.os = Some(Reference::Id(require_os(api, os).await?.id));
    }
    if let Some(desc) = &req.desc {
        image.desc = desc.to_string();
    }
    if let Some(tags) = &req.tags {
        image.tags = tags.clone();
    }
    if let Some(user) = user {
        image.add_tag(user);
    }

    image.status = ImageStatus::new(state::CREATE)
        .with("vagrantfile", req.vagrantfile.clone())
        .with("user_interaction", req.user_interaction);
    fill_md5(&mut image);

    api.save_image(&mut image).await?;

    Ok(image)
}

/// Save an image built up interactively, asking the service to create it.
pub async fn create_from(api: &dyn TalusApi, mut image: Image, user: Option<&str>) -> Result<Image, ApiError> {
    validate(&image, true)?;

    image.id = None;
    image.timestamps.created = Some(Timestamps::now());
    if let Some(user) = user {
        image.add_tag(user);
    }
    if image.status.name.is_empty() {
        image.status.name = state::CREATE.to_string();
    }
    fill_md5(&mut image);

    api.save_image(&mut image).await?;

    Ok(image)
}

fn fill_md5(image: &mut Image) {
    if image.md5.trim().is_empty() {
        image.md5 = MD5_PLACEHOLDER.to_string();
    }
}

/// Boot the image so it can be changed, optionally running a Vagrantfile.
pub async fn configure(
    api: &dyn TalusApi,
    mut image: Image,
    vagrantfile: Option<String>,
    user_interaction: bool,
) -> Result<Image, ApiError> {
    assert_no_children(api, &image).await?;

    image.status = ImageStatus::new(state::CONFIGURE)
        .with("kvm", false)
        .with("vagrantfile", vagrantfile)
        .with("user_interaction", user_interaction);

    api.save_image(&mut image).await?;

    Ok(image)
}

/// Ask the service to delete the image.
pub async fn delete(api: &dyn TalusApi, mut image: Image) -> Result<Image, ApiError> {
    assert_no_children(api, &image).await?;

    image.status = ImageStatus::new(state::DELETE);

    api.save_image(&mut image).await?;

    Ok(image)
}

/// Save local edits to an existing image.
pub async fn save_edits(api: &dyn TalusApi, image: &mut Image) -> Result<(), ApiError> {
    validate(image, false)?;

    image.timestamps.modified = Some(Timestamps::now());

    api.save_image(image).await
}
