//! Testes de host da pilha de armazenamento.
//!
//! Rodam sobre um disco em RAM (`drivers::block::RamDisk`), então
//! exercitam o caminho real block cache -> FAT16 -> VFS sem hardware.

mod block_cache;
mod fat16;
mod vfs;

use crate::drivers::block::RamDisk;
use alloc::sync::Arc;

/// Constrói uma imagem FAT16 virgem de 1024 setores:
/// reserved=1, 2 FATs de 8 setores, root dir de 512 entradas (32
/// setores), dados a partir do setor 49.
pub(crate) fn mkfs_fat16() -> Arc<RamDisk> {
    let mut image = vec![0u8; 1024 * 512];

    // --- BPB ---
    image[0] = 0xEB; // jump
    image[1] = 0x3C;
    image[2] = 0x90;
    image[3..11].copy_from_slice(b"EMBERFS "); // OEM
    image[11..13].copy_from_slice(&512u16.to_le_bytes()); // bytes/setor
    image[13] = 1; // setores/cluster
    image[14..16].copy_from_slice(&1u16.to_le_bytes()); // reservados
    image[16] = 2; // num FATs
    image[17..19].copy_from_slice(&512u16.to_le_bytes()); // root entries
    image[19..21].copy_from_slice(&1024u16.to_le_bytes()); // total setores
    image[21] = 0xF8; // media descriptor
    image[22..24].copy_from_slice(&8u16.to_le_bytes()); // setores/FAT
    image[510] = 0x55;
    image[511] = 0xAA;

    // --- FATs: entradas 0 e 1 reservadas ---
    for fat in 0..2usize {
        let base = (1 + fat * 8) * 512;
        image[base..base + 2].copy_from_slice(&0xFFF8u16.to_le_bytes());
        image[base + 2..base + 4].copy_from_slice(&0xFFFFu16.to_le_bytes());
    }

    Arc::new(RamDisk::from_image(&image, 512))
}
