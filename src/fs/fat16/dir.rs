//! Diretórios FAT16: shortnames, varredura e resolução de caminho.
//!
//! A resolução divide o caminho em `/`, partindo da raiz (cluster 0 é a
//! região fixa do root dir) e descendo pelos clusters dos diretórios
//! filhos. O casamento de nomes é case-insensitive via shortname 8.3 em
//! maiúsculas (11 bytes).

use super::{le16, le32, Fat16Super, FAT_EOC};
use crate::fs::{DirEntryInfo, FsError};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

pub const DIR_ENTRY_SIZE: usize = 32;

/// Atributos de entrada de diretório.
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;

/// Converte um componente de caminho no shortname 8.3 de 11 bytes,
/// maiúsculo e preenchido com espaços.
pub fn make_shortname(name: &str) -> [u8; 11] {
    let mut out = [b' '; 11];
    let bytes = name.as_bytes();
    let mut si = 0;

    // base (8 bytes)
    let mut ni = 0;
    while si < bytes.len() && bytes[si] != b'.' && ni < 8 {
        out[ni] = bytes[si].to_ascii_uppercase();
        ni += 1;
        si += 1;
    }
    // pular até a extensão
    while si < bytes.len() && bytes[si] != b'.' {
        si += 1;
    }
    if si < bytes.len() && bytes[si] == b'.' {
        si += 1;
    }
    // extensão (3 bytes)
    let mut ni = 8;
    while si < bytes.len() && ni < 11 {
        out[ni] = bytes[si].to_ascii_uppercase();
        ni += 1;
        si += 1;
    }

    out
}

/// Reconstrói "NOME.EXT" legível a partir de uma entrada crua.
pub fn shortname_to_string(ent: &[u8]) -> String {
    let mut s = String::new();
    for &b in &ent[0..8] {
        if b == b' ' {
            break;
        }
        s.push(b as char);
    }
    if ent[8] != b' ' {
        s.push('.');
        for &b in &ent[8..11] {
            if b == b' ' {
                break;
            }
            s.push(b as char);
        }
    }
    s
}

/// Resultado da busca de uma entrada num diretório.
pub(crate) enum Lookup {
    /// Entrada encontrada: (bytes da entrada, offset absoluto dela).
    Found([u8; DIR_ENTRY_SIZE], u32),
    /// Não encontrada; carrega o offset de um slot livre, se houver.
    NotFound(Option<u32>),
}

/// Varre o diretório raiz (região fixa) atrás de `name`.
pub(crate) fn find_in_root(sb: &Fat16Super, name: &str) -> Result<Lookup, FsError> {
    let shortname = make_shortname(name);
    let entries_per_sector = sb.bytes_per_sector as u32 / DIR_ENTRY_SIZE as u32;
    let sectors =
        (sb.max_root_entries as u32 + entries_per_sector - 1) / entries_per_sector;

    let mut sec = vec![0u8; sb.bytes_per_sector as usize];
    let mut first_free: Option<u32> = None;

    for s in 0..sectors {
        let sector = sb.root_dir_sector + s;
        sb.read_sector(sector, &mut sec)?;

        for e in 0..entries_per_sector {
            let ent = &sec[(e * DIR_ENTRY_SIZE as u32) as usize..][..DIR_ENTRY_SIZE];
            let abs_off = sector * sb.bytes_per_sector as u32 + e * DIR_ENTRY_SIZE as u32;

            if ent[0] == 0x00 {
                // fim do diretório
                let free = first_free.or(Some(abs_off));
                return Ok(Lookup::NotFound(free));
            }
            if ent[0] == 0xE5 {
                if first_free.is_none() {
                    first_free = Some(abs_off);
                }
                continue;
            }
            if ent[11] & ATTR_VOLUME_ID != 0 {
                continue;
            }
            if ent[0..11] == shortname {
                let mut copy = [0u8; DIR_ENTRY_SIZE];
                copy.copy_from_slice(ent);
                return Ok(Lookup::Found(copy, abs_off));
            }
        }
    }

    Ok(Lookup::NotFound(first_free))
}

/// Varre um diretório encadeado (a partir de `start_cluster`).
pub(crate) fn find_in_dir(
    sb: &Fat16Super,
    start_cluster: u16,
    name: &str,
) -> Result<Lookup, FsError> {
    let shortname = make_shortname(name);
    let entries_per_sector = sb.bytes_per_sector as u32 / DIR_ENTRY_SIZE as u32;

    let mut sec = vec![0u8; sb.bytes_per_sector as usize];
    let mut first_free: Option<u32> = None;
    let mut cur = start_cluster;

    while (2..FAT_EOC).contains(&cur) {
        let base_sector = sb.cluster_to_sector(cur);
        for sc in 0..sb.sectors_per_cluster as u32 {
            let sector = base_sector + sc;
            sb.read_sector(sector, &mut sec)?;

            for e in 0..entries_per_sector {
                let ent = &sec[(e * DIR_ENTRY_SIZE as u32) as usize..][..DIR_ENTRY_SIZE];
                let abs_off = sector * sb.bytes_per_sector as u32 + e * DIR_ENTRY_SIZE as u32;

                if ent[0] == 0x00 {
                    let free = first_free.or(Some(abs_off));
                    return Ok(Lookup::NotFound(free));
                }
                if ent[0] == 0xE5 {
                    if first_free.is_none() {
                        first_free = Some(abs_off);
                    }
                    continue;
                }
                if ent[11] & ATTR_VOLUME_ID != 0 {
                    continue;
                }
                if ent[0..11] == shortname {
                    let mut copy = [0u8; DIR_ENTRY_SIZE];
                    copy.copy_from_slice(ent);
                    return Ok(Lookup::Found(copy, abs_off));
                }
            }
        }

        let next = sb.fat_read_entry(cur);
        if next == 0 || next >= FAT_EOC {
            break;
        }
        cur = next;
    }

    Ok(Lookup::NotFound(first_free))
}

/// Resultado da resolução de um caminho completo.
pub(crate) enum Resolved {
    /// Última componente encontrada.
    Found {
        entry: [u8; DIR_ENTRY_SIZE],
        entry_off: u32,
    },
    /// Última componente inexistente (diretórios intermediários ok).
    NotFound {
        free_off: Option<u32>,
        #[allow(dead_code)]
        parent_cluster: u16,
    },
}

/// Resolve um caminho absoluto caminhando da raiz. Componentes
/// intermediárias precisam ser diretórios.
pub(crate) fn resolve_path(sb: &Fat16Super, path: &str) -> Result<Resolved, FsError> {
    let mut dir_cluster: u16 = 0; // 0 = raiz

    let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
    if components.peek().is_none() {
        return Err(FsError::IsDirectory); // caminho é a própria raiz
    }

    while let Some(comp) = components.next() {
        let is_last = components.peek().is_none();

        let lookup = if dir_cluster == 0 {
            find_in_root(sb, comp)?
        } else {
            find_in_dir(sb, dir_cluster, comp)?
        };

        match lookup {
            Lookup::Found(entry, entry_off) => {
                if is_last {
                    return Ok(Resolved::Found { entry, entry_off });
                }
                // intermediária: precisa ser diretório
                if entry[11] & ATTR_DIRECTORY == 0 {
                    return Err(FsError::NotDirectory);
                }
                let next_cluster = le16(&entry[26..]);
                if next_cluster < 2 {
                    return Err(FsError::NotDirectory);
                }
                dir_cluster = next_cluster;
            }
            Lookup::NotFound(free_off) => {
                if is_last {
                    return Ok(Resolved::NotFound {
                        free_off,
                        parent_cluster: dir_cluster,
                    });
                }
                return Err(FsError::NotFound);
            }
        }
    }

    Err(FsError::NotFound)
}

/// Decodifica as entradas visíveis de um buffer de setor para a lista.
fn collect_entries(sec: &[u8], entries_per_sector: u32, out: &mut Vec<DirEntryInfo>) -> bool {
    for e in 0..entries_per_sector {
        let ent = &sec[(e * DIR_ENTRY_SIZE as u32) as usize..][..DIR_ENTRY_SIZE];
        if ent[0] == 0x00 {
            return false; // fim do diretório
        }
        if ent[0] == 0xE5 || ent[11] & ATTR_VOLUME_ID != 0 {
            continue;
        }
        let name = shortname_to_string(ent);
        if name == "." || name == ".." {
            continue;
        }
        out.push(DirEntryInfo {
            name,
            size: le32(&ent[28..]),
            is_dir: ent[11] & ATTR_DIRECTORY != 0,
        });
    }
    true
}

/// Lista o diretório raiz.
pub fn list_root(sb: &Fat16Super) -> Result<Vec<DirEntryInfo>, FsError> {
    let entries_per_sector = sb.bytes_per_sector as u32 / DIR_ENTRY_SIZE as u32;
    let sectors =
        (sb.max_root_entries as u32 + entries_per_sector - 1) / entries_per_sector;

    let mut out = Vec::new();
    let mut sec = vec![0u8; sb.bytes_per_sector as usize];

    for s in 0..sectors {
        sb.read_sector(sb.root_dir_sector + s, &mut sec)?;
        if !collect_entries(&sec, entries_per_sector, &mut out) {
            break;
        }
    }
    Ok(out)
}

/// Lista um diretório qualquer por caminho absoluto ("/" = raiz).
pub fn list_dir(sb: &Fat16Super, path: &str) -> Result<Vec<DirEntryInfo>, FsError> {
    if path.split('/').all(|c| c.is_empty()) {
        return list_root(sb);
    }

    let entry = match resolve_path(sb, path) {
        Ok(Resolved::Found { entry, .. }) => entry,
        Ok(Resolved::NotFound { .. }) => return Err(FsError::NotFound),
        Err(FsError::IsDirectory) => return list_root(sb),
        Err(e) => return Err(e),
    };

    if entry[11] & ATTR_DIRECTORY == 0 {
        return Err(FsError::NotDirectory);
    }

    let start_cluster = le16(&entry[26..]);
    if start_cluster == 0 {
        return list_root(sb);
    }

    let entries_per_sector = sb.bytes_per_sector as u32 / DIR_ENTRY_SIZE as u32;
    let mut out = Vec::new();
    let mut sec = vec![0u8; sb.bytes_per_sector as usize];
    let mut cur = start_cluster;

    while (2..FAT_EOC).contains(&cur) {
        let base_sector = sb.cluster_to_sector(cur);
        for sc in 0..sb.sectors_per_cluster as u32 {
            sb.read_sector(base_sector + sc, &mut sec)?;
            if !collect_entries(&sec, entries_per_sector, &mut out) {
                return Ok(out);
            }
        }
        let next = sb.fat_read_entry(cur);
        if next == 0 || next >= FAT_EOC {
            break;
        }
        cur = next;
    }

    Ok(out)
}

/// O caminho aponta para um diretório?
pub fn is_dir(sb: &Fat16Super, path: &str) -> bool {
    if path.split('/').all(|c| c.is_empty()) {
        return true; // raiz
    }
    match resolve_path(sb, path) {
        Ok(Resolved::Found { entry, .. }) => entry[11] & ATTR_DIRECTORY != 0,
        Err(FsError::IsDirectory) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortname_basic() {
        assert_eq!(&make_shortname("readme.md"), b"README  MD ");
        assert_eq!(&make_shortname("KERNEL.BIN"), b"KERNEL  BIN");
        assert_eq!(&make_shortname("a"), b"A          ");
        assert_eq!(&make_shortname("noext"), b"NOEXT      ");
    }

    #[test]
    fn test_shortname_truncates() {
        assert_eq!(&make_shortname("verylongname.text"), b"VERYLONGTEX");
    }

    #[test]
    fn test_shortname_case_insensitive() {
        assert_eq!(make_shortname("ReAdMe.Md"), make_shortname("readme.MD"));
    }

    #[test]
    fn test_shortname_roundtrip_string() {
        let ent = {
            let mut e = [0u8; 32];
            e[0..11].copy_from_slice(b"README  MD ");
            e
        };
        assert_eq!(shortname_to_string(&ent), "README.MD");
    }
}
