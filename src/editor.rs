//! An interactive editor for image fields.
//!
//! Each editable field is described by a `Field`: how to read it from an
//! image, how to write it back, and what kind of value it takes. The kind
//! decides how the words typed after `set FIELD` become a `Value`.

use std::io::Write;

use anyhow::{anyhow, bail, Result};

use crate::{
    client::TalusApi,
    images,
    models::{Image, Reference, Search},
    shell::{parse_line, Line},
};

const MAX_SHOWN: usize = 60;

/// What a field holds, and so how input for it is interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    /// A list, given comma or space separated.
    Tags,
    Flag,
    /// An OS, given by id or name.
    Os,
    /// An image, given by id or name.
    Image,
    /// A local file whose contents become the value.
    File,
}

/// A value ready to be stored in a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Tags(Vec<String>),
    Flag(bool),
    Ref(Option<Reference>),
}

impl Value {
    fn into_text(self) -> String {
        match self {
            Value::Text(s) => s,
            Value::Tags(tags) => tags.join(","),
            Value::Flag(b) => b.to_string(),
            Value::Ref(r) => r.map(|r| r.id().to_string()).unwrap_or_default(),
        }
    }

    fn into_tags(self) -> Vec<String> {
        match self {
            Value::Tags(tags) => tags,
            other => split_tags(&other.into_text()),
        }
    }

    fn into_flag(self) -> bool {
        matches!(self, Value::Flag(true))
    }

    fn into_ref(self) -> Option<Reference> {
        match self {
            Value::Ref(r) => r,
            Value::Text(s) if !s.is_empty() => Some(Reference::Id(s)),
            _ => None,
        }
    }
}

pub struct Field {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: FieldKind,
    pub get: fn(&Image) -> String,
    pub set: fn(&mut Image, Value),
}

/// The fields of an existing image.
pub fn image_fields() -> Vec<Field> {
    vec![
        Field {
            name: "name",
            description: "the name of the image",
            kind: FieldKind::Text,
            get: |i| i.name.to_string(),
            set: |i, v| i.name = v.into_text(),
        },
        Field {
            name: "os",
            description: "the operating system of the image (id or name)",
            kind: FieldKind::Os,
            get: |i| i.os.as_ref().map(|r| r.nice_name(true)).unwrap_or_default(),
            set: |i, v| i.os = v.into_ref(),
        },
        Field {
            name: "desc",
            description: "a description of the image",
            kind: FieldKind::Text,
            get: |i| i.desc.to_string(),
            set: |i, v| i.desc = v.into_text(),
        },
        Field {
            name: "tags",
            description: "tags of the image, comma separated",
            kind: FieldKind::Tags,
            get: |i| i.tags.join(","),
            set: |i, v| i.tags = v.into_tags(),
        },
        Field {
            name: "base_image",
            description: "the image this one is based on (id or name)",
            kind: FieldKind::Image,
            get: |i| i.base_image.as_ref().map(|r| r.nice_name(true)).unwrap_or_default(),
            set: |i, v| i.base_image = v.into_ref(),
        },
        Field {
            name: "username",
            description: "the user to log in to the image with",
            kind: FieldKind::Text,
            get: |i| i.username.to_string(),
            set: |i, v| i.username = v.into_text(),
        },
        Field {
            name: "password",
            description: "the password to log in to the image with",
            kind: FieldKind::Text,
            get: |i| i.password.to_string(),
            set: |i, v| i.password = v.into_text(),
        },
    ]
}

/// The fields of an image that is about to be created.
pub fn create_fields() -> Vec<Field> {
    let mut fields = image_fields();

    fields.push(Field {
        name: "interactive",
        description: "boot the new image for manual changes (true/false)",
        kind: FieldKind::Flag,
        get: |i| i.status.user_interaction().to_string(),
        set: |i, v| {
            i.status
                .extra
                .insert("user_interaction".to_string(), v.into_flag().into());
        },
    });
    fields.push(Field {
        name: "vagrantfile",
        description: "a Vagrantfile to run against the new image (path)",
        kind: FieldKind::File,
        get: |i| i.status.vagrantfile().unwrap_or_default().to_string(),
        set: |i, v| {
            let contents = v.into_text();
            if contents.is_empty() {
                i.status.extra.remove("vagrantfile");
            } else {
                i.status.extra.insert("vagrantfile".to_string(), contents.into());
            }
        },
    });

    fields
}

/// How an editing session ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditOutcome {
    Done,
    Cancelled,
}

const COMMANDS: &[&str] = &["show", "set", "done", "save", "cancel", "help"];

pub struct Editor<'a> {
    api: &'a dyn TalusApi,
    fields: Vec<Field>,
    prompt: String,
}

impl<'a> Editor<'a> {
    pub fn new(api: &'a dyn TalusApi, fields: Vec<Field>, prompt: &str) -> Self {
        Editor {
            api,
            fields,
            prompt: prompt.to_string(),
        }
    }

    /// Edit `image` in place until the user is done or cancels.
    ///
    /// Cancelling leaves whatever was already set; callers that care should
    /// edit a copy.
    pub async fn edit(&self, ctx: &mut crate::context::Context<'_>, image: &mut Image) -> Result<EditOutcome> {
        let commands: Vec<String> = COMMANDS.iter().map(|c| c.to_string()).collect();

        loop {
            let line = match ctx.io.read_line(&self.prompt)? {
                Some(line) => line,
                None => return Ok(EditOutcome::Cancelled),
            };

            let args = match parse_line(&line, &commands) {
                Line::Empty => continue,
                Line::Quit => return Ok(EditOutcome::Done),
                Line::Command(args) => args,
                Line::Ambiguous(candidates) => {
                    writeln!(
                        ctx.io.err_out,
                        "Ambiguous command, did you mean one of: {}",
                        candidates.join(", ")
                    )?;
                    continue;
                }
                Line::Unknown(_) => {
                    writeln!(ctx.io.err_out, "Unknown command. Try the 'help' command.")?;
                    continue;
                }
                Line::Invalid(msg) => {
                    writeln!(ctx.io.err_out, "{}", msg)?;
                    continue;
                }
            };

            match args[0].as_str() {
                "done" | "save" => return Ok(EditOutcome::Done),
                "cancel" => return Ok(EditOutcome::Cancelled),
                "show" => self.show(ctx, image)?,
                "help" => self.help(ctx)?,
                "set" => {
                    if let Err(err) = self.set(ctx, image, &args[1..]).await {
                        let cs = ctx.io.color_scheme();
                        writeln!(ctx.io.err_out, "{} {}", cs.failure_icon(), err)?;
                    }
                }
                _ => {}
            }
        }
    }

    fn field(&self, name: &str) -> Result<&Field> {
        self.fields.iter().find(|f| f.name == name).ok_or_else(|| {
            let names: Vec<&str> = self.fields.iter().map(|f| f.name).collect();
            anyhow!("unknown field {:?}, fields are: {}", name, names.join(", "))
        })
    }

    async fn set(&self, ctx: &mut crate::context::Context<'_>, image: &mut Image, args: &[String]) -> Result<()> {
        let (name, words) = match args.split_first() {
            Some(split) => split,
            None => bail!("usage: set FIELD [VALUE...]"),
        };

        let field = self.field(name)?;
        let value = self.value_for(ctx, field, words).await?;
        log::debug!("setting {} to {:?}", field.name, value);
        (field.set)(image, value);

        Ok(())
    }

    /// Turn the words given for `field` into a value.
    async fn value_for(&self, ctx: &mut crate::context::Context<'_>, field: &Field, words: &[String]) -> Result<Value> {
        let raw = words.join(" ");

        match field.kind {
            FieldKind::Text => Ok(Value::Text(raw)),
            FieldKind::Tags => Ok(Value::Tags(words.iter().flat_map(|w| split_tags(w)).collect())),
            FieldKind::Flag => parse_flag(&raw).map(Value::Flag),
            FieldKind::File => {
                if raw.is_empty() {
                    return Ok(Value::Text(String::new()));
                }

                let contents = tokio::fs::read_to_string(&raw)
                    .await
                    .map_err(|e| anyhow!("could not read {}: {}", raw, e))?;
                Ok(Value::Text(contents))
            }
            FieldKind::Os => {
                if raw.is_empty() {
                    return self.pick_os(ctx).await.map(Value::Ref);
                }

                let os = images::find_os(self.api, &raw)
                    .await?
                    .ok_or_else(|| anyhow!("os with id or name {:?} not found", raw))?;
                Ok(Value::Ref(Some(Reference::Expanded { id: os.id, name: os.name })))
            }
            FieldKind::Image => {
                if raw.is_empty() {
                    return self.pick_image(ctx).await.map(Value::Ref);
                }

                let image = images::find_by_id_or_name(self.api, &raw)
                    .await?
                    .ok_or_else(|| anyhow!("image with id or name {:?} not found", raw))?;
                Ok(Value::Ref(Some(Reference::Expanded {
                    id: image.id().to_string(),
                    name: image.name,
                })))
            }
        }
    }

    async fn pick_os(&self, ctx: &mut crate::context::Context<'_>) -> Result<Option<Reference>> {
        if !ctx.io.can_prompt() {
            return Ok(None);
        }

        let oses = self.api.list_oses(&Search::new()).await?;
        let choices: Vec<(String, String)> = oses.into_iter().map(|os| (os.id, os.name)).collect();
        select("Select the os:", choices)
    }

    async fn pick_image(&self, ctx: &mut crate::context::Context<'_>) -> Result<Option<Reference>> {
        if !ctx.io.can_prompt() {
            return Ok(None);
        }

        let mut search = Search::new();
        search.set("sort", "-timestamps.created");
        let found = self.api.list_images(&search).await?;
        let choices: Vec<(String, String)> = found.into_iter().map(|i| (i.id().to_string(), i.name)).collect();
        select("Select the base image:", choices)
    }

    fn show(&self, ctx: &mut crate::context::Context<'_>, image: &Image) -> Result<()> {
        let cs = ctx.io.color_scheme();

        let mut tw = tabwriter::TabWriter::new(vec![]);
        writeln!(tw, "FIELD\tVALUE\tDESCRIPTION")?;
        for field in &self.fields {
            writeln!(
                tw,
                "{}\t{}\t{}",
                cs.bold(field.name),
                shorten(&(field.get)(image)),
                cs.gray(field.description)
            )?;
        }
        tw.flush()?;

        let table = String::from_utf8(tw.into_inner()?)?;
        write!(ctx.io.out, "{}", table)?;

        Ok(())
    }

    fn help(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        writeln!(
            ctx.io.out,
            "Commands:
  show                  show the current values
  set FIELD [VALUE...]  set a field, an empty value clears it
  done                  finish editing (also save, quit, exit, up)
  cancel                abandon the changes
  help                  show this help

Fields: {}",
            self.fields.iter().map(|f| f.name).collect::<Vec<_>>().join(", ")
        )?;

        Ok(())
    }
}

fn select(prompt: &str, choices: Vec<(String, String)>) -> Result<Option<Reference>> {
    if choices.is_empty() {
        return Ok(None);
    }

    let labels: Vec<String> = choices.iter().map(|(id, name)| format!("{} ({})", name, id)).collect();
    let index = dialoguer::Select::new()
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact()
        .map_err(|err| anyhow!("prompt failed: {}", err))?;

    Ok(choices
        .into_iter()
        .nth(index)
        .map(|(id, name)| Reference::Expanded { id, name }))
}

fn split_tags(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn parse_flag(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "no" | "n" | "off" | "0" => Ok(false),
        other => bail!("expected true or false, got {:?}", other),
    }
}

/// One line of at most `MAX_SHOWN` characters.
fn shorten(value: &str) -> String {
    let value = value.replace('\n', " ");
    if value.chars().count() <= MAX_SHOWN {
        return value;
    }

    let mut short: String = value.chars().take(MAX_SHOWN - 3).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{image, FakeApi};

    async fn run_editor(fields: Vec<Field>, api: FakeApi, input: &str, img: &mut Image) -> (EditOutcome, String, String) {
        let mut config = crate::config::new_blank_config().unwrap();
        let mut c = crate::config_from_env::EnvConfig::inherit_env(&mut config);

        let (mut io, stdout_path, stderr_path) = crate::iostreams::IoStreams::test();
        io.set_color_enabled(false);
        io.stdin = Box::new(std::io::Cursor::new(input.to_string()));

        let api = Arc::new(api);
        let mut ctx = crate::context::Context {
            config: &mut c,
            io,
            debug: false,
            api: Some(api.clone()),
            poll_interval: std::time::Duration::ZERO,
        };

        let editor = Editor::new(&*api, fields, "edit> ");
        let outcome = editor.edit(&mut ctx, img).await.unwrap();

        (
            outcome,
            std::fs::read_to_string(stdout_path).unwrap(),
            std::fs::read_to_string(stderr_path).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_edit_fields() {
        let api = FakeApi::new(vec![image("a", "win7", None)]).with_os("os1", "win7pro");
        let mut img = Image::default();

        let input = "set name Win 7 + Office\nset tags office, x64 jane\nset os win7pro\nset base_image win7\ndone\n";
        let (outcome, _, stderr) = run_editor(image_fields(), api, input, &mut img).await;

        assert_eq!(outcome, EditOutcome::Done);
        assert!(stderr.is_empty(), "{}", stderr);
        assert_eq!(img.name, "Win 7 + Office");
        assert_eq!(img.tags, vec!["office".to_string(), "x64".to_string(), "jane".to_string()]);
        assert_eq!(img.os.as_ref().map(|r| r.nice_name(true)), Some("win7pro (os1)".to_string()));
        assert_eq!(img.base_image_id(), Some("a"));
    }

    #[tokio::test]
    async fn test_edit_errors_keep_editing() {
        let api = FakeApi::new(vec![]);
        let mut img = Image::default();

        let input = "set os beos\nset colour blue\nset\nfrobnicate\nset name kept\n";
        let (outcome, _, stderr) = run_editor(image_fields(), api, input, &mut img).await;

        // Input ran out before `done`.
        assert_eq!(outcome, EditOutcome::Cancelled);
        assert_eq!(img.name, "kept");
        assert!(img.os.is_none());
        assert!(stderr.contains(r#"os with id or name "beos" not found"#), "{}", stderr);
        assert!(stderr.contains(r#"unknown field "colour""#), "{}", stderr);
        assert!(stderr.contains("usage: set FIELD"), "{}", stderr);
        assert!(stderr.contains("Unknown command. Try the 'help' command."), "{}", stderr);
    }

    #[tokio::test]
    async fn test_create_fields() {
        let dir = tempfile::tempdir().unwrap();
        let vagrantfile = dir.path().join("Vagrantfile");
        std::fs::write(&vagrantfile, "Vagrant.configure(\"2\")\n").unwrap();

        let api = FakeApi::new(vec![]);
        let mut img = Image::default();

        let input = format!(
            "set interactive yes\nset vagrantfile {}\nset base_image\ncancel\n",
            vagrantfile.display()
        );
        let (outcome, _, stderr) = run_editor(create_fields(), api, &input, &mut img).await;

        assert_eq!(outcome, EditOutcome::Cancelled);
        assert!(stderr.is_empty(), "{}", stderr);
        assert!(img.status.user_interaction());
        assert_eq!(img.status.vagrantfile(), Some("Vagrant.configure(\"2\")\n"));
        // Nothing to pick from without a terminal.
        assert!(img.base_image.is_none());
    }

    #[tokio::test]
    async fn test_show() {
        let api = FakeApi::new(vec![]);
        let mut img = Image {
            name: "win7".to_string(),
            desc: "x".repeat(100),
            ..Default::default()
        };

        let (outcome, stdout, _) = run_editor(image_fields(), api, "show\nquit\n", &mut img).await;

        assert_eq!(outcome, EditOutcome::Done);
        assert!(stdout.contains("FIELD"), "{}", stdout);
        assert!(stdout.contains(&format!("{}...", "x".repeat(57))), "{}", stdout);
        assert!(!stdout.contains(&"x".repeat(58)), "{}", stdout);
        assert!(stdout.contains("username"), "{}", stdout);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("Yes").unwrap());
        assert!(!parse_flag("off").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
