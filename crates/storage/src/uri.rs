use anyhow::{anyhow, Result};
use object_store::path::Path as ObjPath;
use url::Url;

/// A source/target location, split into its parsed `Url` and the
/// object-store-relative `Path` beneath the bucket/container root.
#[derive(Debug, Clone)]
pub struct ParsedUri {
    pub url: Url,
    pub root: ObjPath,
}

pub fn parse_uri(uri: &str) -> Result<ParsedUri> {
    let url = if uri.starts_with("s3://")
        || uri.starts_with("gs://")
        || uri.starts_with("az://")
        || uri.starts_with("abfs://")
        || uri.starts_with("file://")
    {
        Url::parse(uri)?
    } else if uri.starts_with('/') || uri.chars().nth(1) == Some(':') {
        Url::from_file_path(uri).map_err(|_| anyhow!("invalid file path: {uri}"))?
    } else {
        Url::from_file_path(uri).map_err(|_| anyhow!("invalid file path: {uri}"))?
    };
    let root = object_path_from_url(&url);
    Ok(ParsedUri { url, root })
}

pub fn object_path_from_url(url: &Url) -> ObjPath {
    let p = url.path().trim_start_matches('/');
    ObjPath::from(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_uri() {
        let p = parse_uri("/tmp/table").unwrap();
        assert_eq!(p.url.scheme(), "file");
        assert_eq!(p.root.as_ref(), "tmp/table");
    }

    #[test]
    fn parses_s3_uri() {
        let p = parse_uri("s3://bucket/path/to/table").unwrap();
        assert_eq!(p.url.scheme(), "s3");
        assert_eq!(p.root.as_ref(), "path/to/table");
    }

    #[test]
    fn parses_azure_dfs_uri() {
        let p = parse_uri("abfs://container/path/to/table").unwrap();
        assert_eq!(p.url.scheme(), "abfs");
        assert_eq!(p.root.as_ref(), "path/to/table");
    }
}
