//! Category identifiers and their backend labels.
//!
//! UI identifiers are stable and travel through URLs and stored snapshots.
//! Backend labels are what `listings.category` holds; historical rows use
//! several spellings for the same category, so the reverse lookup compares
//! normalized labels (case, accents and surrounding whitespace ignored).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(rename_all = "lowercase")]
pub enum CategoryId {
    Alimentos,
    Servicos,
    Eletronicos,
    Moveis,
    Roupas,
    Casa,
    Esportes,
    Infantil,
    Beleza,
    Pets,
    Veiculos,
    Outros,
}

impl CategoryId {
    pub const ALL: [CategoryId; 12] = [
        Self::Alimentos,
        Self::Servicos,
        Self::Eletronicos,
        Self::Moveis,
        Self::Roupas,
        Self::Casa,
        Self::Esportes,
        Self::Infantil,
        Self::Beleza,
        Self::Pets,
        Self::Veiculos,
        Self::Outros,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alimentos => "alimentos",
            Self::Servicos => "servicos",
            Self::Eletronicos => "eletronicos",
            Self::Moveis => "moveis",
            Self::Roupas => "roupas",
            Self::Casa => "casa",
            Self::Esportes => "esportes",
            Self::Infantil => "infantil",
            Self::Beleza => "beleza",
            Self::Pets => "pets",
            Self::Veiculos => "veiculos",
            Self::Outros => "outros",
        }
    }

    /// Canonical label written by current clients.
    pub fn label(self) -> &'static str {
        match self {
            Self::Alimentos => "Alimentos",
            Self::Servicos => "Serviços",
            Self::Eletronicos => "Eletrônicos",
            Self::Moveis => "Móveis",
            Self::Roupas => "Roupas e Acessórios",
            Self::Casa => "Casa e Decoração",
            Self::Esportes => "Esportes e Lazer",
            Self::Infantil => "Infantil",
            Self::Beleza => "Beleza e Saúde",
            Self::Pets => "Pets",
            Self::Veiculos => "Veículos",
            Self::Outros => "Outros",
        }
    }

    fn historical_labels(self) -> &'static [&'static str] {
        match self {
            Self::Alimentos => &["Alimento", "Comida", "Alimentação"],
            Self::Servicos => &["Serviço", "Servico"],
            Self::Eletronicos => &["Eletrônico", "Eletronico"],
            Self::Moveis => &["Móvel", "Movel"],
            Self::Roupas => &["Roupas", "Vestuário"],
            Self::Casa => &["Casa", "Decoração"],
            Self::Esportes => &["Esportes", "Esporte"],
            Self::Infantil => &["Bebês e Crianças", "Brinquedos"],
            Self::Beleza => &["Beleza", "Saúde"],
            Self::Pets => &["Pet", "Animais"],
            Self::Veiculos => &["Veículo", "Automóveis"],
            Self::Outros => &["Outro", "Diversos"],
        }
    }

    fn labels(self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.label()).chain(self.historical_labels().iter().copied())
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl FromStr for CategoryId {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CategoryId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Result of translating a UI category id into a backend label.
#[derive(Debug, PartialEq, Eq)]
pub enum ResolvedCategory<'a> {
    Mapped(&'static str),
    /// No mapping entry; the raw value is used as-is.
    Passthrough(&'a str),
}

impl ResolvedCategory<'_> {
    pub fn value(&self) -> &str {
        match self {
            Self::Mapped(label) => label,
            Self::Passthrough(raw) => raw,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

pub struct CategoryMapping;

impl CategoryMapping {
    pub fn to_backend(ui_id: &str) -> ResolvedCategory<'_> {
        match ui_id.parse::<CategoryId>() {
            Ok(id) => ResolvedCategory::Mapped(id.label()),
            Err(_) => ResolvedCategory::Passthrough(ui_id),
        }
    }

    pub fn from_backend(label: &str) -> Option<CategoryId> {
        let wanted = normalize_label(label);
        CategoryId::ALL
            .into_iter()
            .find(|id| id.labels().any(|known| normalize_label(known) == wanted))
    }
}

fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
