#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    TarGz,
    Bin,
    Msi,
    Exe,
    Pkg,
    AppImage,
}

impl ArchiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
            Self::Bin => "bin",
            Self::Msi => "msi",
            Self::Exe => "exe",
            Self::Pkg => "pkg",
            Self::AppImage => "appimage",
        }
    }

    pub fn cache_extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            other => other.as_str(),
        }
    }

    pub fn is_extractable(self) -> bool {
        matches!(self, Self::Zip | Self::TarGz)
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            "tar.gz" | "tgz" => Some(Self::TarGz),
            "bin" => Some(Self::Bin),
            "msi" => Some(Self::Msi),
            "exe" => Some(Self::Exe),
            "pkg" => Some(Self::Pkg),
            "appimage" => Some(Self::AppImage),
            _ => None,
        }
    }

    pub fn infer_from_url(url: &str) -> Option<Self> {
        let lower = url.to_ascii_lowercase();
        let without_fragment = lower.split('#').next().unwrap_or(&lower);
        let without_query = without_fragment
            .split('?')
            .next()
            .unwrap_or(without_fragment);
        let file_name = without_query.rsplit('/').next().unwrap_or("");

        if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
            return Some(Self::TarGz);
        }
        if let Some((_, extension)) = file_name.rsplit_once('.') {
            return Self::parse(extension);
        }
        if !file_name.is_empty() {
            return Some(Self::Bin);
        }

        None
    }
}
