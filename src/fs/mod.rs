//! Pilha de armazenamento: block cache, FAT16 e VFS.

pub mod block_cache;
pub mod fat16;
pub mod vfs;

#[cfg(test)]
mod tests;

use crate::drivers::block::BlockDevice;
use crate::sync::Spinlock;
use alloc::string::String;
use alloc::sync::Arc;

/// Erros de filesystem propagados até a borda do VFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Entrada inexistente
    NotFound,
    /// Componente intermediário não é diretório
    NotDirectory,
    /// Operação de arquivo num diretório
    IsDirectory,
    /// BPB/estrutura inválida (ex: setor != 512)
    InvalidFormat,
    /// Falha de I/O no dispositivo/cache
    IoError,
    /// FAT sem clusters livres ou diretório cheio
    NoSpace,
    /// Operação não suportada pelo backend
    Unsupported,
}

impl FsError {
    /// Código negativo na borda do VFS (distinto de EOF, que é 0).
    pub fn code(self) -> i32 {
        match self {
            FsError::NotFound => -2,
            FsError::NotDirectory => -20,
            FsError::IsDirectory => -21,
            FsError::InvalidFormat => -8,
            FsError::IoError => -5,
            FsError::NoSpace => -28,
            FsError::Unsupported => -38,
        }
    }
}

/// Entrada de diretório como o VFS a expõe.
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: String,
    pub size: u32,
    pub is_dir: bool,
}

/// Monta a pilha de armazenamento no boot: ATA -> block cache -> VFS.
pub fn init() {
    let device = match crate::drivers::ata::init() {
        Some(d) => d,
        None => {
            crate::kwarn!("(FS) sem disco ATA; VFS fica sem backend");
            return;
        }
    };

    init_with_device(device);
}

/// Monta a pilha sobre um dispositivo de bloco arbitrário.
pub fn init_with_device(device: Arc<dyn BlockDevice>) {
    let cache = match block_cache::BlockCache::new(device, 512, 128) {
        Ok(c) => Arc::new(Spinlock::new(c)),
        Err(e) => {
            crate::kerror!("(FS) block cache falhou: {:?}", e);
            return;
        }
    };

    vfs::register_builtin_backends();

    match vfs::mount_with_cache(cache) {
        Ok(name) => crate::kinfo!("(FS) montado backend '{}'", name),
        Err(_) => crate::kwarn!("(FS) nenhum backend reconheceu o disco"),
    }
}
