//! Snapshot trees: the forest images form through their base image.

use crate::{
    client::TalusApi,
    colors::ColorScheme,
    error::ApiError,
    images,
    models::{Image, Search},
};

const CONNECTOR: &str = "  └──";
const LEVEL_INDENT: &str = "     ";

/// One row of a rendered tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeLine {
    pub depth: usize,
    pub image: Image,
    /// Draw attention to this row (the image the tree was built for).
    pub highlight: bool,
}

impl TreeLine {
    fn new(depth: usize, image: Image) -> Self {
        TreeLine {
            depth,
            image,
            highlight: false,
        }
    }

    fn indent(&self) -> String {
        if self.depth == 0 {
            return String::new();
        }

        format!("{}{} ", LEVEL_INDENT.repeat(self.depth - 1), CONNECTOR)
    }

    fn plain_text(&self) -> String {
        format!("{}{}", self.indent(), self.image.name)
    }

    fn colored_text(&self, cs: &ColorScheme) -> String {
        if self.depth == 0 && !self.highlight {
            return self.image.name.to_string();
        }

        let indent = if self.depth == 0 {
            String::new()
        } else {
            format!("{}{} ", LEVEL_INDENT.repeat(self.depth - 1), cs.blue(CONNECTOR))
        };
        let name = if self.highlight {
            cs.green(&self.image.name)
        } else {
            self.image.name.to_string()
        };

        format!("{}{}", indent, name)
    }
}

/// The chain of base images above `image`, root first.
///
/// Fails with `NotFound` if a base image no longer exists.
pub async fn ancestors(api: &dyn TalusApi, image: &Image) -> Result<Vec<Image>, ApiError> {
    let mut chain = Vec::new();
    let mut next = image.base_image_id().map(str::to_string);

    while let Some(id) = next {
        let parent = images::find_one(api, &Search::by("id", &id))
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("base image {}", id)))?;

        next = parent.base_image_id().map(str::to_string);
        chain.push(parent);
    }

    chain.reverse();
    Ok(chain)
}

/// Flatten the tree below `image` in pre-order.
///
/// The image comes first at `depth`, followed (if `recurse`) by each child
/// and its own descendants, children in the order the service lists them.
pub async fn flatten(api: &dyn TalusApi, image: &Image, depth: usize, recurse: bool) -> Result<Vec<TreeLine>, ApiError> {
    let mut lines = Vec::new();
    let mut stack = vec![(depth, image.clone())];

    while let Some((depth, image)) = stack.pop() {
        if recurse {
            let children = images::children(api, &image).await?;
            stack.extend(children.into_iter().rev().map(|child| (depth + 1, child)));
        }

        lines.push(TreeLine::new(depth, image));
    }

    Ok(lines)
}

/// The tree an image lives in: its ancestors, then the image with everything
/// based on it. The image itself is highlighted.
pub async fn image_tree(api: &dyn TalusApi, image: &Image) -> Result<Vec<TreeLine>, ApiError> {
    let mut lines = Vec::new();

    let chain = ancestors(api, image).await?;
    let depth = chain.len();
    for (i, ancestor) in chain.iter().enumerate() {
        lines.extend(flatten(api, ancestor, i, false).await?);
    }

    let mut own = flatten(api, image, depth, true).await?;
    if let Some(first) = own.first_mut() {
        first.highlight = true;
    }
    lines.extend(own);

    Ok(lines)
}

/// Every tree rooted at one of `roots`, one after the other.
pub async fn forest(api: &dyn TalusApi, roots: &[Image]) -> Result<Vec<TreeLine>, ApiError> {
    let mut lines = Vec::new();
    for root in roots {
        lines.extend(flatten(api, root, 0, true).await?);
    }

    Ok(lines)
}

/// Render tree lines as a table of name, status, id and tags.
pub fn render(lines: &[TreeLine], cs: &ColorScheme) -> Vec<String> {
    let width = lines
        .iter()
        .map(|l| l.plain_text().chars().count())
        .chain(std::iter::once("image name".len()))
        .max()
        .unwrap_or_default();

    let header = format!(
        "{:^width$}    {:20} {:30} {}",
        "image name",
        "status",
        "id",
        "tags",
        width = width
    );

    let mut out = vec![cs.bold(&header), "-".repeat(header.chars().count())];

    for line in lines {
        let pad = width - line.plain_text().chars().count();
        let row = format!(
            "{}{}    {:20} {:30} {}",
            line.colored_text(cs),
            " ".repeat(pad),
            line.image.status.display(),
            line.image.id(),
            line.image.tags.join(",")
        );
        out.push(row.trim_end().to_string());
    }

    out
}
