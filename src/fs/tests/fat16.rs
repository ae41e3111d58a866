//! Testes do FAT16 sobre imagem sintética.

use super::mkfs_fat16;
use crate::fs::block_cache::BlockCache;
use crate::fs::fat16::{dir, file, Fat16Super};
use crate::fs::FsError;
use crate::sync::Spinlock;
use alloc::sync::Arc;

fn mount() -> (Arc<crate::drivers::block::RamDisk>, Fat16Super) {
    let disk = mkfs_fat16();
    let cache = Arc::new(Spinlock::new(
        BlockCache::new(disk.clone(), 512, 16).unwrap(),
    ));
    let sb = Fat16Super::mount_with_cache(cache).unwrap();
    (disk, sb)
}

#[test]
fn test_mount_parses_bpb() {
    let (_disk, sb) = mount();
    assert_eq!(sb.bytes_per_sector, 512);
    assert_eq!(sb.sectors_per_cluster, 1);
    assert_eq!(sb.num_fats, 2);
    assert_eq!(sb.max_root_entries, 512);
    assert_eq!(sb.root_dir_sector, 17); // 1 reservado + 2*8 de FAT
    assert_eq!(sb.first_data_sector, 49); // + 32 setores de root dir
}

#[test]
fn test_mount_rejects_nonstandard_sector() {
    let disk = mkfs_fat16();
    // corromper bytes_per_sector para 1024
    {
        use crate::drivers::block::BlockDevice;
        let mut sector0 = [0u8; 512];
        disk.read_block(0, &mut sector0).unwrap();
        sector0[11..13].copy_from_slice(&1024u16.to_le_bytes());
        disk.write_block(0, &sector0).unwrap();
    }
    let cache = Arc::new(Spinlock::new(BlockCache::new(disk, 512, 16).unwrap()));
    assert_eq!(
        Fat16Super::mount_with_cache(cache).err(),
        Some(FsError::InvalidFormat)
    );
}

#[test]
fn test_write_read_roundtrip() {
    let (_disk, sb) = mount();
    let data = b"hi\n";

    file::write_file(&sb, "/README.MD", data).unwrap();
    assert_eq!(file::get_file_size(&sb, "/README.MD").unwrap(), 3);

    let mut buf = [0u8; 16];
    let n = file::read_file(&sb, "/README.MD", &mut buf).unwrap();
    assert_eq!(&buf[..n], data);
}

#[test]
fn test_multi_cluster_roundtrip() {
    let (_disk, sb) = mount();
    // 3.5 clusters de 512 bytes
    let mut data = vec![0u8; 1792];
    for (i, b) in data.iter_mut().enumerate() {
        *b = (i * 7 % 256) as u8;
    }

    file::write_file(&sb, "/BIG.BIN", &data).unwrap();
    assert_eq!(file::get_file_size(&sb, "/BIG.BIN").unwrap(), 1792);

    let mut buf = vec![0u8; 4096];
    let n = file::read_file(&sb, "/BIG.BIN", &mut buf).unwrap();
    assert_eq!(n, 1792);
    assert_eq!(&buf[..n], &data[..]);
}

#[test]
fn test_overwrite_truncates() {
    let (_disk, sb) = mount();

    file::write_file(&sb, "/F.TXT", &[0xAA; 1000]).unwrap();
    file::write_file(&sb, "/F.TXT", b"curto").unwrap();

    assert_eq!(file::get_file_size(&sb, "/F.TXT").unwrap(), 5);
    let mut buf = [0u8; 64];
    let n = file::read_file(&sb, "/F.TXT", &mut buf).unwrap();
    assert_eq!(&buf[..n], b"curto");
}

#[test]
fn test_empty_file() {
    let (_disk, sb) = mount();
    file::create_file(&sb, "/EMPTY.TXT").unwrap();
    assert_eq!(file::get_file_size(&sb, "/EMPTY.TXT").unwrap(), 0);
    let mut buf = [0u8; 8];
    assert_eq!(file::read_file(&sb, "/EMPTY.TXT", &mut buf).unwrap(), 0);
}

#[test]
fn test_not_found() {
    let (_disk, sb) = mount();
    assert_eq!(
        file::get_file_size(&sb, "/NADA.TXT").err(),
        Some(FsError::NotFound)
    );
    let mut buf = [0u8; 8];
    assert_eq!(
        file::read_file(&sb, "/NADA.TXT", &mut buf).err(),
        Some(FsError::NotFound)
    );
}

#[test]
fn test_case_insensitive_lookup() {
    let (_disk, sb) = mount();
    file::write_file(&sb, "/MiXeD.TxT", b"x").unwrap();
    assert_eq!(file::get_file_size(&sb, "/mixed.txt").unwrap(), 1);
    assert_eq!(file::get_file_size(&sb, "/MIXED.TXT").unwrap(), 1);
}

#[test]
fn test_list_root() {
    let (_disk, sb) = mount();
    file::write_file(&sb, "/A.TXT", b"aaa").unwrap();
    file::write_file(&sb, "/B.TXT", b"bbbb").unwrap();

    let entries = dir::list_root(&sb).unwrap();
    assert_eq!(entries.len(), 2);
    let a = entries.iter().find(|e| e.name == "A.TXT").unwrap();
    assert_eq!(a.size, 3);
    assert!(!a.is_dir);
    let b = entries.iter().find(|e| e.name == "B.TXT").unwrap();
    assert_eq!(b.size, 4);
}

#[test]
fn test_is_dir_root() {
    let (_disk, sb) = mount();
    assert!(dir::is_dir(&sb, "/"));
    file::write_file(&sb, "/X.TXT", b"x").unwrap();
    assert!(!dir::is_dir(&sb, "/X.TXT"));
    assert!(!dir::is_dir(&sb, "/NAO_EXISTE"));
}

#[test]
fn test_both_fats_updated() {
    let (disk, sb) = mount();
    file::write_file(&sb, "/S.TXT", b"sync").unwrap();
    sb.sync().unwrap();

    // comparar as duas cópias da FAT no dispositivo
    use crate::drivers::block::BlockDevice;
    for s in 0..8u64 {
        let mut fat0 = [0u8; 512];
        let mut fat1 = [0u8; 512];
        disk.read_block(1 + s, &mut fat0).unwrap();
        disk.read_block(9 + s, &mut fat1).unwrap();
        assert_eq!(fat0, fat1, "FATs dessincronizadas no setor {}", s);
    }
}

#[test]
fn test_persistence_across_remount() {
    let (disk, sb) = mount();
    file::write_file(&sb, "/KEEP.TXT", b"persist").unwrap();
    sb.sync().unwrap();
    drop(sb);

    let cache = Arc::new(Spinlock::new(BlockCache::new(disk, 512, 16).unwrap()));
    let sb2 = Fat16Super::mount_with_cache(cache).unwrap();
    let mut buf = [0u8; 32];
    let n = file::read_file(&sb2, "/KEEP.TXT", &mut buf).unwrap();
    assert_eq!(&buf[..n], b"persist");
}

#[test]
fn test_freed_clusters_are_reused() {
    let (_disk, sb) = mount();

    file::write_file(&sb, "/R.TXT", &[1u8; 512 * 4]).unwrap();
    file::write_file(&sb, "/R.TXT", &[2u8; 512]).unwrap(); // libera 3

    // um novo arquivo grande ainda cabe (clusters foram devolvidos)
    let total = sb.total_clusters();
    assert!(total > 8);
    file::write_file(&sb, "/R2.TXT", &[3u8; 512 * 4]).unwrap();

    let mut buf = vec![0u8; 512 * 4];
    assert_eq!(file::read_file(&sb, "/R2.TXT", &mut buf).unwrap(), 2048);
    assert!(buf.iter().all(|&b| b == 3));
}
