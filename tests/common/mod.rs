#![allow(dead_code)]

use std::sync::Arc;

use hanzigloss_rs::{
    CancelToken, DictionaryLoader, DictionarySnapshot, DictionarySource, LoadConfig, MemoryStorage,
};

pub const PART_FOOD: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<WordList>
  <Word>
    <Hanzi>吃</Hanzi>
    <Traditional>喫</Traditional>
    <Meaning><Pinyin>chī</Pinyin><Translation>to eat</Translation><Translation>to consume</Translation></Meaning>
    <Meaning><Pinyin>chī</Pinyin><Translation>to suffer (a loss)</Translation></Meaning>
    <Tag>HSK1</Tag>
  </Word>
  <Word>
    <Hanzi>食</Hanzi>
    <Meaning><Pinyin>shí</Pinyin><Translation>to eat</Translation><Translation>food</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>用饭</Hanzi>
    <Traditional>用飯</Traditional>
    <Meaning><Pinyin>yòng fàn</Pinyin><Translation>to eat a meal</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>哺</Hanzi>
    <Meaning><Pinyin>bǔ</Pinyin><Translation>to feed</Translation><Translation>to eat (literary)</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>你</Hanzi>
    <Meaning><Pinyin>nǐ</Pinyin><Translation>you</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>好</Hanzi>
    <Meaning><Pinyin>hǎo</Pinyin><Translation>good</Translation><Translation>well</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>你好</Hanzi>
    <Meaning><Pinyin>nǐ hǎo</Pinyin><Translation>hello</Translation><Translation>hi</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>吗</Hanzi>
    <Traditional>嗎</Traditional>
    <Meaning><Pinyin>ma</Pinyin><Translation>(question particle)</Translation></Meaning>
  </Word>
</WordList>
"#;

pub const PART_PLACES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<WordList>
  <Word>
    <Hanzi>中国</Hanzi>
    <Traditional>中國</Traditional>
    <Meaning><Pinyin>zhōng guó</Pinyin><Translation>China</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>中</Hanzi>
    <Meaning><Pinyin>zhōng</Pinyin><Translation>middle</Translation><Translation>center</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>国</Hanzi>
    <Traditional>國</Traditional>
    <Meaning><Pinyin>guó</Pinyin><Translation>country</Translation><Translation>nation</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>人</Hanzi>
    <Meaning><Pinyin>rén</Pinyin><Translation>person</Translation><Translation>people</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>中国人</Hanzi>
    <Traditional>中國人</Traditional>
    <Meaning><Pinyin>zhōng guó rén</Pinyin><Translation>Chinese person</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>国人</Hanzi>
    <Traditional>國人</Traditional>
    <Meaning><Pinyin>guó rén</Pinyin><Translation>compatriots</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>上海</Hanzi>
    <Meaning><Pinyin>shàng hǎi</Pinyin><Translation>Shanghai</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>伤害</Hanzi>
    <Traditional>傷害</Traditional>
    <Meaning><Pinyin>shāng hài</Pinyin><Translation>to injure</Translation><Translation>to harm</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>浦东机场</Hanzi>
    <Traditional>浦東機場</Traditional>
    <Meaning><Pinyin>pǔ dōng jī chǎng</Pinyin><Translation>Pudong Airport (Shanghai)</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>虹桥机场</Hanzi>
    <Traditional>虹橋機場</Traditional>
    <Meaning><Pinyin>hóng qiáo jī chǎng</Pinyin><Translation>Hongqiao Airport (Shanghai)</Translation></Meaning>
  </Word>
  <Word>
    <Hanzi>机场</Hanzi>
    <Traditional>機場</Traditional>
    <Meaning><Pinyin>jī chǎng</Pinyin><Translation>airport</Translation></Meaning>
  </Word>
</WordList>
"#;

pub const XML_FOLDER: &str = "words";

/// In-memory storage holding the sample word lists under [`XML_FOLDER`].
pub fn sample_storage() -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage.insert(format!("{XML_FOLDER}/01-food.xml"), PART_FOOD);
    storage.insert(format!("{XML_FOLDER}/02-places.xml"), PART_PLACES);
    storage
}

pub fn sample_loader(storage: &MemoryStorage) -> DictionaryLoader {
    DictionaryLoader::new(Arc::new(storage.clone()), LoadConfig::default())
}

pub fn load(loader: &DictionaryLoader, source: DictionarySource) -> DictionarySnapshot {
    loader
        .load(&source, &CancelToken::new())
        .expect("sample dictionary loads")
        .complete()
        .expect("load was not cancelled")
}

pub fn sample_dictionary() -> DictionarySnapshot {
    let storage = sample_storage();
    load(&sample_loader(&storage), DictionarySource::XmlFolder(XML_FOLDER.to_string()))
}

pub fn headwords(snapshot: &DictionarySnapshot, indices: impl IntoIterator<Item = usize>) -> Vec<String> {
    indices
        .into_iter()
        .map(|index| snapshot.word(index).expect("valid index").headword().to_string())
        .collect()
}
