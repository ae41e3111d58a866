//! FAT16 — conteúdo de arquivos: leitura/escrita de cadeias de clusters.
//!
//! A escrita é um overwrite truncante: a cadeia antiga é liberada, uma
//! nova com `ceil(len/cluster_bytes)` clusters é alocada varrendo a FAT
//! por entradas 0 e ligada com o terminador 0xFFFF; por fim a entrada
//! de diretório recebe o novo tamanho e cluster inicial.

use super::dir::{self, Resolved, ATTR_ARCHIVE, DIR_ENTRY_SIZE};
use super::{le16, le32, Fat16Super, FAT_EOC, FAT_EOC_WRITE};
use crate::fs::FsError;
use alloc::vec;
use alloc::vec::Vec;

/// Tamanho do arquivo em bytes.
pub fn get_file_size(sb: &Fat16Super, path: &str) -> Result<u32, FsError> {
    match dir::resolve_path(sb, path)? {
        Resolved::Found { entry, .. } => Ok(le32(&entry[28..])),
        Resolved::NotFound { .. } => Err(FsError::NotFound),
    }
}

/// Lê até `buf.len()` bytes do arquivo. Retorna os bytes lidos.
pub fn read_file(sb: &Fat16Super, path: &str, buf: &mut [u8]) -> Result<usize, FsError> {
    let entry = match dir::resolve_path(sb, path)? {
        Resolved::Found { entry, .. } => entry,
        Resolved::NotFound { .. } => return Err(FsError::NotFound),
    };
    if entry[11] & dir::ATTR_DIRECTORY != 0 {
        return Err(FsError::IsDirectory);
    }

    let start_cluster = le16(&entry[26..]);
    let file_size = le32(&entry[28..]);
    if file_size == 0 {
        return Ok(0);
    }
    if start_cluster < 2 {
        return Err(FsError::InvalidFormat);
    }

    let to_read = (file_size as usize).min(buf.len());
    let cluster_bytes = sb.cluster_bytes() as usize;
    let mut cluster_buf = vec![0u8; cluster_bytes];

    let mut read = 0usize;
    let mut cur = start_cluster;

    while (2..FAT_EOC).contains(&cur) && read < to_read {
        let base_sector = sb.cluster_to_sector(cur);
        for sc in 0..sb.sectors_per_cluster as u32 {
            let off = sc as usize * sb.bytes_per_sector as usize;
            sb.read_sector(
                base_sector + sc,
                &mut cluster_buf[off..off + sb.bytes_per_sector as usize],
            )?;
        }

        let take = (to_read - read).min(cluster_bytes);
        buf[read..read + take].copy_from_slice(&cluster_buf[..take]);
        read += take;

        let next = sb.fat_read_entry(cur);
        if next == 0 || next >= FAT_EOC {
            break;
        }
        cur = next;
    }

    Ok(read)
}

/// Libera uma cadeia inteira (entradas da FAT voltam a 0).
fn free_chain(sb: &Fat16Super, start: u16) -> Result<(), FsError> {
    let mut cur = start;
    while (2..FAT_EOC).contains(&cur) {
        let next = sb.fat_read_entry(cur);
        sb.fat_write_entry(cur, 0)?;
        if next == 0 || next >= FAT_EOC {
            break;
        }
        cur = next;
    }
    Ok(())
}

/// Aloca `n` clusters livres (varredura da FAT por entradas 0) e liga a
/// cadeia, com o último apontando para 0xFFFF. Retorna o cluster
/// inicial.
fn allocate_chain(sb: &Fat16Super, n: u16) -> Result<u16, FsError> {
    if n == 0 {
        return Err(FsError::NoSpace);
    }
    let total = sb.total_clusters();
    let mut list: Vec<u16> = Vec::with_capacity(n as usize);

    let mut c: u32 = 2;
    while c < 2 + total && (list.len() as u16) < n {
        if sb.fat_read_entry(c as u16) == 0 {
            list.push(c as u16);
        }
        c += 1;
    }

    if (list.len() as u16) < n {
        return Err(FsError::NoSpace);
    }

    for i in 0..list.len() {
        let value = if i + 1 == list.len() {
            FAT_EOC_WRITE
        } else {
            list[i + 1]
        };
        sb.fat_write_entry(list[i], value)?;
    }

    Ok(list[0])
}

/// Grava a entrada de diretório `ent` no offset absoluto `off`.
fn write_dir_entry(sb: &Fat16Super, off: u32, ent: &[u8; DIR_ENTRY_SIZE]) -> Result<(), FsError> {
    sb.write_bytes(off, ent)
}

/// Cria um arquivo vazio (ou trunca um existente para zero).
pub fn create_file(sb: &Fat16Super, path: &str) -> Result<(), FsError> {
    let name = path.rsplit('/').find(|c| !c.is_empty()).ok_or(FsError::NotFound)?;

    match dir::resolve_path(sb, path)? {
        Resolved::Found { entry, entry_off } => {
            let start = le16(&entry[26..]);
            if start >= 2 {
                free_chain(sb, start)?;
            }
            let mut updated = entry;
            updated[26] = 0;
            updated[27] = 0;
            updated[28..32].fill(0);
            write_dir_entry(sb, entry_off, &updated)
        }
        Resolved::NotFound { free_off, .. } => {
            let off = free_off.ok_or(FsError::NoSpace)?;
            let mut ent = [0u8; DIR_ENTRY_SIZE];
            ent[0..11].copy_from_slice(&dir::make_shortname(name));
            ent[11] = ATTR_ARCHIVE;
            write_dir_entry(sb, off, &ent)
        }
    }
}

/// Overwrite truncante do arquivo `path` com `data`.
pub fn write_file(sb: &Fat16Super, path: &str, data: &[u8]) -> Result<(), FsError> {
    let name = path.rsplit('/').find(|c| !c.is_empty()).ok_or(FsError::NotFound)?;

    // resolver e preparar a entrada (existente ou modelo novo)
    let resolved = dir::resolve_path(sb, path)?;
    let (mut ent, entry_off) = match &resolved {
        Resolved::Found { entry, entry_off } => {
            if entry[11] & dir::ATTR_DIRECTORY != 0 {
                return Err(FsError::IsDirectory);
            }
            let old_start = le16(&entry[26..]);
            if old_start >= 2 {
                free_chain(sb, old_start)?;
            }
            (*entry, *entry_off)
        }
        Resolved::NotFound { free_off, .. } => {
            let off = free_off.ok_or(FsError::NoSpace)?;
            let mut ent = [0u8; DIR_ENTRY_SIZE];
            ent[0..11].copy_from_slice(&dir::make_shortname(name));
            ent[11] = ATTR_ARCHIVE;
            (ent, off)
        }
    };

    // arquivo vazio: entrada sem cadeia
    if data.is_empty() {
        ent[26] = 0;
        ent[27] = 0;
        ent[28..32].fill(0);
        return write_dir_entry(sb, entry_off, &ent);
    }

    let cluster_bytes = sb.cluster_bytes() as usize;
    let need = ((data.len() + cluster_bytes - 1) / cluster_bytes) as u16;
    let start_cluster = allocate_chain(sb, need)?;

    // escrever os dados seguindo a cadeia
    let mut cluster_buf = vec![0u8; cluster_bytes];
    let mut written = 0usize;
    let mut cur = start_cluster;

    while (2..FAT_EOC).contains(&cur) && written < data.len() {
        let take = (data.len() - written).min(cluster_bytes);
        cluster_buf[..take].copy_from_slice(&data[written..written + take]);
        cluster_buf[take..].fill(0);

        let base_sector = sb.cluster_to_sector(cur);
        for sc in 0..sb.sectors_per_cluster as u32 {
            let off = (base_sector + sc) * sb.bytes_per_sector as u32;
            let buf_off = sc as usize * sb.bytes_per_sector as usize;
            sb.write_bytes(
                off,
                &cluster_buf[buf_off..buf_off + sb.bytes_per_sector as usize],
            )?;
        }

        written += take;
        let next = sb.fat_read_entry(cur);
        if next == 0 || next >= FAT_EOC {
            break;
        }
        cur = next;
    }

    // atualizar entrada de diretório: cluster inicial + tamanho
    ent[26..28].copy_from_slice(&start_cluster.to_le_bytes());
    ent[28..32].copy_from_slice(&(data.len() as u32).to_le_bytes());
    write_dir_entry(sb, entry_off, &ent)
}
