//! FAT16 — superblock, I/O byte-granular e acesso à FAT.
//!
//! O superblock nasce do BPB no bloco 0 via block cache e vive até o
//! unmount. Apenas setores de 512 bytes são aceitos na montagem.
//!
//! A cadeia de clusters termina em entradas >= 0xFFF8; entrada 0 na FAT
//! significa cluster livre. As duas cópias da FAT são mantidas em
//! sincronia em toda escrita.

pub mod dir;
pub mod file;

use super::block_cache::BlockCache;
use super::FsError;
use crate::sync::Spinlock;
use alloc::sync::Arc;
use alloc::vec;

/// Marca de fim de cadeia (qualquer valor >= 0xFFF8).
pub const FAT_EOC: u16 = 0xFFF8;

/// Valor gravado no último cluster de uma cadeia nova.
pub const FAT_EOC_WRITE: u16 = 0xFFFF;

#[inline]
pub(crate) fn le16(p: &[u8]) -> u16 {
    u16::from_le_bytes([p[0], p[1]])
}

#[inline]
pub(crate) fn le32(p: &[u8]) -> u32 {
    u32::from_le_bytes([p[0], p[1], p[2], p[3]])
}

/// Superblock FAT16 montado.
pub struct Fat16Super {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub max_root_entries: u16,
    pub total_sectors: u32,
    pub fat_size_sectors: u16,
    /// Primeiro setor da área de dados (cluster 2).
    pub first_data_sector: u32,
    /// Primeiro setor da região fixa do diretório raiz.
    pub root_dir_sector: u32,
    cache: Arc<Spinlock<BlockCache>>,
}

impl Fat16Super {
    /// Monta a partir do BPB do bloco 0 lido pelo cache.
    pub fn mount_with_cache(cache: Arc<Spinlock<BlockCache>>) -> Result<Self, FsError> {
        let block_size = cache.lock().block_size();
        let mut sector0 = vec![0u8; block_size];
        cache
            .lock()
            .read(0, &mut sector0)
            .map_err(|_| FsError::IoError)?;

        let bytes_per_sector = le16(&sector0[11..]);
        let sectors_per_cluster = sector0[13];
        let reserved_sectors = le16(&sector0[14..]);
        let num_fats = sector0[16];
        let max_root_entries = le16(&sector0[17..]);
        let total_sectors_16 = le16(&sector0[19..]);
        let mut fat_size_sectors = le16(&sector0[22..]);
        let total_sectors = if total_sectors_16 != 0 {
            total_sectors_16 as u32
        } else {
            le32(&sector0[32..])
        };
        if fat_size_sectors == 0 {
            fat_size_sectors = le32(&sector0[36..]) as u16;
        }

        // restrição desta release: setor de 512 bytes
        if bytes_per_sector != 512 {
            return Err(FsError::InvalidFormat);
        }
        if sectors_per_cluster == 0 || num_fats == 0 || fat_size_sectors == 0 {
            return Err(FsError::InvalidFormat);
        }

        let root_dir_sectors = ((max_root_entries as u32 * 32) + (bytes_per_sector as u32 - 1))
            / bytes_per_sector as u32;
        let root_dir_sector = reserved_sectors as u32 + num_fats as u32 * fat_size_sectors as u32;
        let first_data_sector = root_dir_sector + root_dir_sectors;

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            max_root_entries,
            total_sectors,
            fat_size_sectors,
            first_data_sector,
            root_dir_sector,
            cache,
        })
    }

    /// Bytes por cluster.
    pub fn cluster_bytes(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    /// Setor inicial do cluster `c` (c >= 2).
    pub fn cluster_to_sector(&self, cluster: u16) -> u32 {
        self.first_data_sector + (cluster as u32 - 2) * self.sectors_per_cluster as u32
    }

    /// Total de clusters de dados.
    pub fn total_clusters(&self) -> u32 {
        (self.total_sectors.saturating_sub(self.first_data_sector))
            / self.sectors_per_cluster as u32
    }

    /// Offset em bytes do início da primeira FAT.
    fn fat_offset_bytes(&self) -> u32 {
        self.reserved_sectors as u32 * self.bytes_per_sector as u32
    }

    // ------------------------------------------------------------------
    // I/O byte-granular via cache (read-modify-write por bloco)
    // ------------------------------------------------------------------

    pub(crate) fn read_bytes(&self, offset: u32, dst: &mut [u8]) -> Result<(), FsError> {
        if dst.is_empty() {
            return Ok(());
        }
        let mut cache = self.cache.lock();
        let bs = cache.block_size() as u32;
        let mut tmp = vec![0u8; bs as usize];

        let start_block = offset / bs;
        let end_block = (offset + dst.len() as u32 - 1) / bs;
        let mut copied = 0usize;

        for b in start_block..=end_block {
            cache.read(b as u64, &mut tmp).map_err(|_| FsError::IoError)?;
            let block_off = b * bs;
            let from = offset.max(block_off) - block_off;
            let avail = (bs - from) as usize;
            let need = dst.len() - copied;
            let take = need.min(avail);
            dst[copied..copied + take]
                .copy_from_slice(&tmp[from as usize..from as usize + take]);
            copied += take;
        }
        Ok(())
    }

    pub(crate) fn write_bytes(&self, offset: u32, src: &[u8]) -> Result<(), FsError> {
        if src.is_empty() {
            return Ok(());
        }
        let mut cache = self.cache.lock();
        let bs = cache.block_size() as u32;
        let mut tmp = vec![0u8; bs as usize];

        let start_block = offset / bs;
        let end_block = (offset + src.len() as u32 - 1) / bs;
        let mut written = 0usize;

        for b in start_block..=end_block {
            cache.read(b as u64, &mut tmp).map_err(|_| FsError::IoError)?;
            let block_off = b * bs;
            let from = offset.max(block_off) - block_off;
            let avail = (bs - from) as usize;
            let need = src.len() - written;
            let take = need.min(avail);
            tmp[from as usize..from as usize + take]
                .copy_from_slice(&src[written..written + take]);
            cache.write(b as u64, &tmp).map_err(|_| FsError::IoError)?;
            written += take;
        }
        Ok(())
    }

    /// Lê um setor lógico do volume.
    pub(crate) fn read_sector(&self, sector: u32, buf: &mut [u8]) -> Result<(), FsError> {
        let off = sector * self.bytes_per_sector as u32;
        self.read_bytes(off, &mut buf[..self.bytes_per_sector as usize])
    }

    // ------------------------------------------------------------------
    // Entradas da FAT
    // ------------------------------------------------------------------

    /// Lê a entrada de 16 bits do cluster `c`. Erro de I/O vira EOF.
    pub(crate) fn fat_read_entry(&self, cluster: u16) -> u16 {
        let off = self.fat_offset_bytes() + cluster as u32 * 2;
        let mut buf = [0u8; 2];
        if self.read_bytes(off, &mut buf).is_err() {
            return FAT_EOC_WRITE;
        }
        le16(&buf)
    }

    /// Escreve a entrada do cluster `c` em TODAS as cópias da FAT.
    pub(crate) fn fat_write_entry(&self, cluster: u16, value: u16) -> Result<(), FsError> {
        let base = self.fat_offset_bytes() + cluster as u32 * 2;
        let bytes = value.to_le_bytes();
        for f in 0..self.num_fats as u32 {
            let off = base + f * self.fat_size_sectors as u32 * self.bytes_per_sector as u32;
            self.write_bytes(off, &bytes)?;
        }
        Ok(())
    }

    /// Descarrega blocos sujos do cache para o dispositivo.
    pub fn sync(&self) -> Result<(), FsError> {
        self.cache.lock().flush().map_err(|_| FsError::IoError)
    }
}
