use std::{io::Write, path::PathBuf};

use anyhow::{anyhow, bail, Context as _, Result};
use clap::{CommandFactory, Parser};

use crate::{
    client::TalusApi,
    editor::{self, EditOutcome, Editor},
    error::ApiError,
    images,
    models::{state, Image, ImageStatus, Search},
    poll::{DeleteOutcome, WaitOutcome},
    search::{self, SearchTerms},
    tree,
};

/// How many images `list` shows without `--all` or `--num`.
const DEFAULT_LIST_SIZE: usize = 20;

/// List, create, configure, and delete images.
///
/// Without a subcommand this starts the image shell.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdImage {
    #[clap(subcommand)]
    subcmd: Option<SubCommand>,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    List(CmdImageList),
    Tree(CmdImageTree),
    Info(CmdImageInfo),
    Import(CmdImageImport),
    Edit(CmdImageEdit),
    Create(CmdImageCreate),
    Configure(CmdImageConfigure),
    Delete(CmdImageDelete),
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdImage {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        match &self.subcmd {
            Some(SubCommand::List(cmd)) => cmd.run(ctx).await,
            Some(SubCommand::Tree(cmd)) => cmd.run(ctx).await,
            Some(SubCommand::Info(cmd)) => cmd.run(ctx).await,
            Some(SubCommand::Import(cmd)) => cmd.run(ctx).await,
            Some(SubCommand::Edit(cmd)) => cmd.run(ctx).await,
            Some(SubCommand::Create(cmd)) => cmd.run(ctx).await,
            Some(SubCommand::Configure(cmd)) => cmd.run(ctx).await,
            Some(SubCommand::Delete(cmd)) => cmd.run(ctx).await,
            None => crate::shell::run(&ImageShell, ctx).await,
        }
    }
}

impl CmdImage {
    /// Adjust a command typed into a shell: a bare `create` opens the editor.
    pub(crate) fn in_shell(mut self) -> Self {
        if let Some(SubCommand::Create(create)) = &mut self.subcmd {
            if !create.has_args() {
                create.shell = true;
            }
        }

        self
    }
}

/// The `talus:image>` shell.
pub struct ImageShell;

#[async_trait::async_trait]
impl crate::shell::Shell for ImageShell {
    fn prompt(&self) -> String {
        "talus:image> ".to_string()
    }

    fn commands(&self) -> Vec<String> {
        crate::shell::subcommand_names(&CmdImage::command())
    }

    async fn dispatch(&self, ctx: &mut crate::context::Context, args: Vec<String>) -> Result<()> {
        let cmd = match crate::shell::parse_args::<CmdImage>("image", &args, &mut ctx.io)? {
            Some(cmd) => cmd,
            None => return Ok(()),
        };

        // An empty subcommand here would start a nested image shell.
        if cmd.subcmd.is_none() {
            return Ok(());
        }

        crate::cmd::Command::run(&cmd.in_shell(), ctx).await
    }
}

/// Restrict a search to the configured user's images, saying so.
fn filter_by_user(ctx: &mut crate::context::Context, terms: &mut SearchTerms) -> Result<()> {
    let user = match ctx.user() {
        Some(user) => user,
        None => return Ok(()),
    };

    if terms.apply_user_filter(Some(&user)) {
        writeln!(
            ctx.io.err_out,
            "default filtering by username (searching for tags = {}), use --all to view all images",
            user
        )?;
    }

    Ok(())
}

/// Resolve the image a command was pointed at: the first word that is not
/// part of a search term.
async fn resolve_reference(
    ctx: &mut crate::context::Context<'_>,
    api: &dyn TalusApi,
    args: &[String],
    missing: &str,
) -> Result<Image> {
    // `--all-mine` is accepted and has no effect.
    let mut terms = SearchTerms::parse(&search::drop_flag(args, "--all-mine"));
    let reference = match terms.leftover.first() {
        Some(reference) => reference.to_string(),
        None => bail!("{}", missing),
    };

    // Only relative references go through the search.
    if reference.starts_with('+') {
        filter_by_user(ctx, &mut terms)?;
    }

    Ok(images::require_one(api, Some(&reference), terms.search).await?)
}

/// Print the snapshot tree around `image`.
async fn show_tree(ctx: &mut crate::context::Context<'_>, api: &dyn TalusApi, image: &Image) -> Result<()> {
    let lines = tree::image_tree(api, image).await?;

    let cs = ctx.io.color_scheme();
    for line in tree::render(&lines, &cs) {
        writeln!(ctx.io.out, "{}", line)?;
    }

    Ok(())
}

/// Wait for an image to come up and say how it ended.
async fn wait_for_image(
    ctx: &mut crate::context::Context<'_>,
    api: &dyn TalusApi,
    image: &mut Image,
    interactive: bool,
) -> Result<()> {
    ctx.io
        .start_process_indicator_with_label(&format!("waiting for image {}", image.name));
    let outcome = ctx.poller(api).wait_for_image(image, interactive).await;
    ctx.io.stop_process_indicator();

    let cs = ctx.io.color_scheme();
    match outcome? {
        WaitOutcome::Configuring { uri } => {
            writeln!(
                ctx.io.out,
                "{} Image is up and running at {}",
                cs.success_icon(),
                uri.as_deref().unwrap_or("an unknown address")
            )?;
            writeln!(
                ctx.io.out,
                "{} Shutdown (yes, nicely shut it down) to save your changes",
                cs.warning_icon()
            )?;
        }
        WaitOutcome::Ready => {
            writeln!(ctx.io.out, "{} image '{}' is ready for use", cs.success_icon(), image.name)?;
        }
        WaitOutcome::Failed(reason) => {
            bail!("image '{}' failed: {}", image.name, reason);
        }
    }

    Ok(())
}

async fn read_vagrantfile(path: &Option<PathBuf>) -> Result<Option<String>> {
    match path {
        Some(path) => {
            let contents = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("could not read vagrantfile {}", path.display()))?;
            Ok(Some(contents))
        }
        None => Ok(None),
    }
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Print validation problems one per line, or hand other errors back.
fn report_validation(ctx: &mut crate::context::Context, err: ApiError) -> Result<()> {
    match err {
        ApiError::Validation(messages) => {
            let cs = ctx.io.color_scheme();
            for msg in messages {
                writeln!(ctx.io.err_out, "{} {}", cs.failure_icon(), msg)?;
            }
            Ok(())
        }
        err => Err(err.into()),
    }
}

/// List images.
///
/// Any `--KEY VALUE` pair narrows the search, e.g.
///
///     $ talus image list --name win7 --status ready
///
/// Only the first 20 images are shown unless `--all` or `--num` is given.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment, setting = clap::AppSettings::AllowHyphenValues)]
pub struct CmdImageList {
    /// Show every matching image.
    #[clap(long)]
    pub all: bool,

    /// Output format.
    #[clap(long, short, default_value = "table")]
    pub format: crate::types::FormatOutput,

    /// Search terms, as `--KEY VALUE` pairs.
    #[clap(name = "search", multiple_values = true, allow_hyphen_values = true)]
    pub search: Vec<String>,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdImageList {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        // Options given after the first search term end up in `search`.
        let mut args = self.search.clone();
        let format = match search::take_option(&mut args, &["--format", "-f"]) {
            Some(format) => format.parse::<crate::types::FormatOutput>().map_err(|_| {
                anyhow!(
                    "invalid value {:?} for --format, valid values: {}",
                    format,
                    crate::types::FormatOutput::variants().join(", ")
                )
            })?,
            None => self.format.clone(),
        };

        let mut terms = SearchTerms::parse(&args);
        terms.deny_leftover()?;

        let all = self.all || terms.all;
        terms.search.set_default("sort", "timestamps.created");
        if !all && !terms.search.contains("num") {
            terms.search.set("num", &DEFAULT_LIST_SIZE.to_string());
            writeln!(
                ctx.io.err_out,
                "showing first {} results, use --all to see everything",
                DEFAULT_LIST_SIZE
            )?;
        }

        let api = ctx.api_client()?;
        let images = api.list_images(&terms.search).await?;

        if format.write_value(&mut ctx.io, &serde_json::to_value(&images)?)? {
            return Ok(());
        }

        let cs = ctx.io.color_scheme();

        let mut tw = tabwriter::TabWriter::new(vec![]);
        writeln!(tw, "ID\tNAME\tSTATUS\tBASE IMAGE\tTAGS")?;
        for image in &images {
            writeln!(
                tw,
                "{}\t{}\t{}\t{}\t{}",
                cs.gray(image.id()),
                cs.bold(&image.name),
                image.status.display(),
                image
                    .base_image
                    .as_ref()
                    .map(|b| b.nice_name(false))
                    .unwrap_or_default(),
                image.tags.join(",")
            )?;
        }
        tw.flush()?;

        let table = String::from_utf8(tw.into_inner()?)?;
        write!(ctx.io.out, "{}", table)?;

        Ok(())
    }
}

/// Show the snapshot forest of root images.
///
/// Search terms select the roots; by default every image without a base.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment, setting = clap::AppSettings::AllowHyphenValues)]
pub struct CmdImageTree {
    /// Search terms, as `--KEY VALUE` pairs.
    #[clap(name = "search", multiple_values = true, allow_hyphen_values = true)]
    pub search: Vec<String>,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdImageTree {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        let mut terms = SearchTerms::parse(&self.search);
        terms.deny_leftover()?;
        terms.search.set_default("base_image", "null");

        let api = ctx.api_client()?;
        let roots = api.list_images(&terms.search).await?;
        let lines = tree::forest(&*api, &roots).await?;

        let cs = ctx.io.color_scheme();
        for line in tree::render(&lines, &cs) {
            writeln!(ctx.io.out, "{}", line)?;
        }

        Ok(())
    }
}

/// Show details about an image and where it sits in its snapshot tree.
///
/// The image is given by id, name, or `+N` for the N-th most recently
/// created image matching the search terms.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment, setting = clap::AppSettings::AllowHyphenValues)]
pub struct CmdImageInfo {
    /// The image id, name or `+N`, then optional `--KEY VALUE` search terms.
    #[clap(name = "image", multiple_values = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdImageInfo {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        let api = ctx.api_client()?;
        let image = resolve_reference(
            ctx,
            &*api,
            &self.args,
            "you must provide a name/id of an image to show info about it",
        )
        .await?;

        let mut status = image.status.name.to_string();
        if !image.status.extra.is_empty() {
            status = format!("{} {}", status, serde_json::Value::Object(image.status.extra.clone()));
        }

        let mut tw = tabwriter::TabWriter::new(vec![]);
        writeln!(tw, "id:\t{}", image.id())?;
        writeln!(tw, "name:\t{}", image.name)?;
        writeln!(tw, "status:\t{}", status)?;
        writeln!(tw, "tags:\t{}", image.tags.join(", "))?;
        writeln!(
            tw,
            "base image:\t{}",
            image.base_image.as_ref().map(|b| b.nice_name(true)).unwrap_or_default()
        )?;
        writeln!(
            tw,
            "os:\t{}",
            image.os.as_ref().map(|o| o.nice_name(true)).unwrap_or_default()
        )?;
        writeln!(tw, "description:\t{}", image.desc)?;
        if let Some(created) = image.timestamps.created.and_then(crate::models::Timestamps::to_datetime) {
            writeln!(tw, "created:\t{}", chrono_humanize::HumanTime::from(created))?;
        }
        if let Some(modified) = image.timestamps.modified.and_then(crate::models::Timestamps::to_datetime) {
            writeln!(tw, "modified:\t{}", chrono_humanize::HumanTime::from(modified))?;
        }
        tw.flush()?;

        let table = String::from_utf8(tw.into_inner()?)?;
        writeln!(ctx.io.out, "{}", table)?;
        writeln!(ctx.io.out, "Snapshot Tree:")?;
        writeln!(ctx.io.out)?;

        show_tree(ctx, &*api, &image).await
    }
}

/// Import a disk image as a new root image.
///
/// The file is uploaded first unless `--file-id` names one that already was.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdImageImport {
    /// The disk image to import.
    #[clap(name = "file", required = true, parse(from_os_str))]
    pub file: PathBuf,

    /// The id or name of the image's OS.
    #[clap(long, short)]
    pub os: String,

    /// The name of the new image. Defaults to the file's name.
    #[clap(long, short)]
    pub name: Option<String>,

    /// A description of the image.
    #[clap(long = "desc", short = 'd', default_value = "desc")]
    pub desc: String,

    /// The id of an already uploaded file.
    #[clap(long, short = 'f')]
    pub file_id: Option<String>,

    /// Comma separated tags.
    #[clap(long, short, default_value = "")]
    pub tags: String,

    /// The username to log in to the image with.
    #[clap(long, short, default_value = "user")]
    pub username: String,

    /// The password to log in to the image with.
    #[clap(long, short, default_value = "password")]
    pub password: String,

    /// Stop waiting once the image can be configured by hand.
    #[clap(long, short)]
    pub interactive: bool,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdImageImport {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        let name = match &self.name {
            Some(name) => name.to_string(),
            None => self
                .file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| anyhow!("could not get a name from {}", self.file.display()))?,
        };

        let req = images::ImportRequest {
            path: self.file.clone(),
            name,
            os: self.os.to_string(),
            desc: self.desc.to_string(),
            tags: split_tags(&self.tags),
            file_id: self.file_id.clone(),
            username: self.username.to_string(),
            password: self.password.to_string(),
        };

        let api = ctx.api_client()?;
        let user = ctx.user();
        let mut image = images::import(&*api, &req, user.as_deref()).await?;

        let cs = ctx.io.color_scheme();
        writeln!(ctx.io.out, "{} imported image {}", cs.success_icon(), image.id())?;

        wait_for_image(ctx, &*api, &mut image, self.interactive).await
    }
}

/// Edit an image's fields in the field editor.
///
/// This does not start the image for configuring.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment, setting = clap::AppSettings::AllowHyphenValues)]
pub struct CmdImageEdit {
    /// The image id, name or `+N`, then optional `--KEY VALUE` search terms.
    #[clap(name = "image", multiple_values = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdImageEdit {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        let api = ctx.api_client()?;
        let image = resolve_reference(ctx, &*api, &self.args, "you must provide a name/id of an image to edit it").await?;

        let editor = Editor::new(&*api, editor::image_fields(), "talus:image:edit> ");
        let mut working = image.clone();

        loop {
            if editor.edit(ctx, &mut working).await? == EditOutcome::Cancelled {
                writeln!(ctx.io.out, "cancelled, image {} was not changed", image.id())?;
                return Ok(());
            }

            match images::save_edits(&*api, &mut working).await {
                Ok(()) => break,
                Err(err) => report_validation(ctx, err)?,
            }
        }

        let cs = ctx.io.color_scheme();
        writeln!(ctx.io.out, "{} edited image {}", cs.success_icon(), working.id())?;
        writeln!(
            ctx.io.out,
            "{} note that this DOES NOT start the image for configuring!",
            cs.warning_icon()
        )?;

        Ok(())
    }
}

/// Create a new image based on an existing one.
///
/// Fields not given are copied from the base image. With `--shell`, or
/// without any arguments inside a talus shell, the new image is set up in
/// the field editor instead.
#[derive(Parser, Debug, Clone, Default)]
#[clap(verbatim_doc_comment)]
pub struct CmdImageCreate {
    /// The name of the new image.
    #[clap(long, short)]
    pub name: Option<String>,

    /// The id or name of the base image.
    #[clap(long, short)]
    pub base: Option<String>,

    /// The id or name of the OS, if it differs from the base image's.
    #[clap(long, short)]
    pub os: Option<String>,

    /// A description of the image.
    #[clap(long = "desc", short = 'd')]
    pub desc: Option<String>,

    /// Comma separated tags, replacing the base image's.
    #[clap(long, short)]
    pub tags: Option<String>,

    /// A Vagrantfile to run against the new image.
    #[clap(long, short, parse(from_os_str))]
    pub vagrantfile: Option<PathBuf>,

    /// Boot the image so it can be configured by hand.
    #[clap(long, short)]
    pub interactive: bool,

    /// Set up the image in the field editor.
    #[clap(long)]
    pub shell: bool,
}

impl CmdImageCreate {
    fn has_args(&self) -> bool {
        self.name.is_some()
            || self.base.is_some()
            || self.os.is_some()
            || self.desc.is_some()
            || self.tags.is_some()
            || self.vagrantfile.is_some()
            || self.interactive
    }

    async fn create_in_editor(&self, ctx: &mut crate::context::Context<'_>, api: &dyn TalusApi) -> Result<()> {
        let user = ctx.user();

        let mut image = Image {
            desc: "some description".to_string(),
            username: "user".to_string(),
            password: "password".to_string(),
            status: ImageStatus::new(state::CREATE)
                .with("vagrantfile", serde_json::Value::Null)
                .with("user_interaction", true),
            ..Default::default()
        };
        if let Some(user) = &user {
            image.add_tag(user);
        }

        let editor = Editor::new(api, editor::create_fields(), "talus:image:create> ");
        let mut created = loop {
            if editor.edit(ctx, &mut image).await? == EditOutcome::Cancelled {
                writeln!(ctx.io.out, "cancelled, no image was created")?;
                return Ok(());
            }

            match images::create_from(api, image.clone(), user.as_deref()).await {
                Ok(created) => break created,
                Err(err) => report_validation(ctx, err)?,
            }
        };

        let cs = ctx.io.color_scheme();
        writeln!(ctx.io.out, "{} created new image {}", cs.success_icon(), created.id())?;

        let interactive = created.status.user_interaction();
        wait_for_image(ctx, api, &mut created, interactive).await
    }
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdImageCreate {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        let api = ctx.api_client()?;

        if self.shell {
            return self.create_in_editor(ctx, &*api).await;
        }

        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("You must specify an image name".to_string());
        }
        if self.base.is_none() {
            missing.push("You must specify the base image".to_string());
        }
        if !missing.is_empty() {
            return Err(ApiError::Validation(missing).into());
        }

        let req = images::CreateRequest {
            name: self.name.clone().unwrap_or_default(),
            base: self.base.clone().unwrap_or_default(),
            os: self.os.clone(),
            desc: self.desc.clone(),
            tags: self.tags.as_deref().map(split_tags),
            vagrantfile: read_vagrantfile(&self.vagrantfile).await?,
            user_interaction: self.interactive,
        };

        let user = ctx.user();
        let mut image = images::create(&*api, &req, user.as_deref()).await?;

        let cs = ctx.io.color_scheme();
        writeln!(ctx.io.out, "{} created new image {}", cs.success_icon(), image.id())?;

        wait_for_image(ctx, &*api, &mut image, self.interactive).await
    }
}

/// Boot an image so it can be changed.
///
/// Images that other images are based on cannot be configured.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdImageConfigure {
    /// The id or name of the image.
    #[clap(name = "image", required = true)]
    pub image: String,

    /// A Vagrantfile to run against the image.
    #[clap(long, short, parse(from_os_str))]
    pub vagrantfile: Option<PathBuf>,

    /// Stop waiting once the image can be configured by hand.
    #[clap(long, short)]
    pub interactive: bool,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdImageConfigure {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        let api = ctx.api_client()?;
        let image = images::require_one(&*api, Some(&self.image), Search::new()).await?;
        let vagrantfile = read_vagrantfile(&self.vagrantfile).await?;

        let mut image = match images::configure(&*api, image.clone(), vagrantfile, self.interactive).await {
            Ok(image) => image,
            Err(err @ ApiError::HasDependents(_)) => {
                show_tree(ctx, &*api, &image).await?;
                bail!("{}, cannot configure the image", err);
            }
            Err(err) => return Err(err.into()),
        };

        let cs = ctx.io.color_scheme();
        writeln!(ctx.io.out, "{} configuring image {}", cs.success_icon(), image.id())?;

        wait_for_image(ctx, &*api, &mut image, self.interactive).await
    }
}

/// Delete an image.
///
/// Images that other images are based on cannot be deleted.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdImageDelete {
    /// The id or name of the image.
    #[clap(name = "image", required = true)]
    pub image: String,

    /// Confirm deletion without prompting.
    #[clap(long)]
    pub confirm: bool,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdImageDelete {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()> {
        if !ctx.io.can_prompt() && !self.confirm {
            return Err(anyhow!("--confirm required when not running interactively"));
        }

        let api = ctx.api_client()?;
        let image = images::require_one(&*api, Some(&self.image), Search::new()).await?;

        // Refuse before asking for confirmation.
        match images::assert_no_children(&*api, &image).await {
            Ok(()) => {}
            Err(err @ ApiError::HasDependents(_)) => {
                show_tree(ctx, &*api, &image).await?;
                bail!("{}, cannot delete the image", err);
            }
            Err(err) => return Err(err.into()),
        }

        // Confirm deletion.
        if !self.confirm {
            if let Err(err) = dialoguer::Input::<String>::new()
                .with_prompt(format!("Type {} to confirm deletion:", self.image))
                .validate_with(|input: &String| -> Result<(), &str> {
                    if input.trim() == self.image {
                        Ok(())
                    } else {
                        Err("mismatched confirmation")
                    }
                })
                .interact_text()
            {
                return Err(anyhow!("prompt failed: {}", err));
            }
        }

        let mut deleting = match images::delete(&*api, image.clone()).await {
            Ok(image) => image,
            Err(err @ ApiError::HasDependents(_)) => {
                show_tree(ctx, &*api, &image).await?;
                bail!("{}, cannot delete the image", err);
            }
            Err(err) => return Err(err.into()),
        };

        ctx.io
            .start_process_indicator_with_label(&format!("deleting image {}", image.name));
        let outcome = ctx.poller(&*api).wait_for_delete(&mut deleting).await;
        ctx.io.stop_process_indicator();

        match outcome? {
            DeleteOutcome::Deleted => {
                let cs = ctx.io.color_scheme();
                writeln!(ctx.io.out, "{} image successfully deleted", cs.success_icon())?;
                Ok(())
            }
            DeleteOutcome::Failed(reason) => Err(anyhow!("could not delete image due to: {}", reason)),
        }
    }
}
