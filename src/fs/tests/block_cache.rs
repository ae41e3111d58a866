//! Testes do block cache.

use crate::drivers::block::RamDisk;
use crate::fs::block_cache::BlockCache;
use alloc::sync::Arc;

fn make_cache(entries: usize) -> (Arc<RamDisk>, BlockCache) {
    let disk = Arc::new(RamDisk::new(64, 512));
    let cache = BlockCache::new(disk.clone(), 512, entries).unwrap();
    (disk, cache)
}

#[test]
fn test_rejects_bad_geometry() {
    let disk = Arc::new(RamDisk::new(64, 512));
    assert!(BlockCache::new(disk.clone(), 256, 4).is_err()); // < setor
    assert!(BlockCache::new(disk.clone(), 768, 4).is_err()); // não múltiplo
    assert!(BlockCache::new(disk, 1024, 4).is_ok()); // 2 setores por bloco
}

#[test]
fn test_read_hit_after_miss() {
    let (_disk, mut cache) = make_cache(4);
    let mut buf = [0u8; 512];

    cache.read(3, &mut buf).unwrap();
    let (hits, misses) = cache.stats();
    assert_eq!((hits, misses), (0, 1));

    cache.read(3, &mut buf).unwrap();
    let (hits, misses) = cache.stats();
    assert_eq!((hits, misses), (1, 1));
}

#[test]
fn test_write_is_write_back() {
    let (disk, mut cache) = make_cache(4);
    let data = [0x5Au8; 512];
    cache.write(7, &data).unwrap();

    // antes do flush o dispositivo ainda tem zeros
    let mut raw = [0u8; 512];
    use crate::drivers::block::BlockDevice;
    disk.read_block(7, &mut raw).unwrap();
    assert_eq!(raw, [0u8; 512]);

    cache.flush().unwrap();
    disk.read_block(7, &mut raw).unwrap();
    assert_eq!(raw, data);
}

#[test]
fn test_coherence_across_reinit() {
    // Propriedade: write(b, X); flush(); destroy(); re-init; read(b) == X
    let disk = Arc::new(RamDisk::new(64, 512));
    let data = [0xC3u8; 512];

    {
        let mut cache = BlockCache::new(disk.clone(), 512, 4).unwrap();
        cache.write(11, &data).unwrap();
        cache.flush().unwrap();
        // drop = destroy
    }

    let mut cache = BlockCache::new(disk, 512, 4).unwrap();
    let mut buf = [0u8; 512];
    cache.read(11, &mut buf).unwrap();
    assert_eq!(buf, data);
}

#[test]
fn test_destroy_flushes_dirty() {
    let disk = Arc::new(RamDisk::new(64, 512));
    let data = [0x77u8; 512];

    {
        let mut cache = BlockCache::new(disk.clone(), 512, 4).unwrap();
        cache.write(5, &data).unwrap();
        // sem flush explícito: o Drop precisa escrever de volta
    }

    use crate::drivers::block::BlockDevice;
    let mut raw = [0u8; 512];
    disk.read_block(5, &mut raw).unwrap();
    assert_eq!(raw, data);
}

#[test]
fn test_lru_eviction_writes_back_dirty() {
    // cache de 2 entradas; 3 blocos sujos forçam evicção do LRU
    let (disk, mut cache) = make_cache(2);
    let a = [1u8; 512];
    let b = [2u8; 512];
    let c = [3u8; 512];

    cache.write(0, &a).unwrap();
    cache.write(1, &b).unwrap();
    cache.write(2, &c).unwrap(); // evicta o bloco 0 (mais antigo)

    use crate::drivers::block::BlockDevice;
    let mut raw = [0u8; 512];
    disk.read_block(0, &mut raw).unwrap();
    assert_eq!(raw, a, "vítima suja foi escrita de volta");

    // e os três blocos continuam legíveis com o conteúdo certo
    let mut buf = [0u8; 512];
    cache.read(0, &mut buf).unwrap();
    assert_eq!(buf, a);
    cache.read(1, &mut buf).unwrap();
    assert_eq!(buf, b);
    cache.read(2, &mut buf).unwrap();
    assert_eq!(buf, c);
}

#[test]
fn test_multi_sector_blocks() {
    // bloco de 1024 = 2 setores
    let disk = Arc::new(RamDisk::new(64, 512));
    let mut cache = BlockCache::new(disk.clone(), 1024, 2).unwrap();

    let mut data = [0u8; 1024];
    for (i, b) in data.iter_mut().enumerate() {
        *b = (i % 251) as u8;
    }
    cache.write(3, &data).unwrap();
    cache.flush().unwrap();

    // bloco 3 = setores 6 e 7
    use crate::drivers::block::BlockDevice;
    let mut raw = [0u8; 512];
    disk.read_block(6, &mut raw).unwrap();
    assert_eq!(&raw[..], &data[..512]);
    disk.read_block(7, &mut raw).unwrap();
    assert_eq!(&raw[..], &data[512..]);
}
